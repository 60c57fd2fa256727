//! Shared utilities for the Perch workspace.
//!
//! Currently this is only [`observability`], the centralised tracing/logging
//! initialisation used by the binary and by integration tests. The crate is
//! intentionally lightweight so every other crate can depend on it without
//! pulling in heavy transitive costs.

pub mod observability;
