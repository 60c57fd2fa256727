//! Sentiment tagging and tabulation for fetched posts.
//!
//! The pipeline is two independent halves: [`clean`] + a [`PolarityScorer`]
//! turn text into a categorical [`SentimentLabel`], and [`tabulate`] turns a
//! fetched batch into a [`PostTable`] whose sentiment column is appended as
//! a separate pass.

pub mod clean;
pub mod sentiment;
pub mod table;

pub use clean::clean;
pub use sentiment::{classify_sentiment, PolarityScorer, SentimentLabel, VaderScorer};
pub use table::{tabulate, PostRow, PostTable};
