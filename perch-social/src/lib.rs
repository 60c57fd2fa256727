//! Client for the remote social service: authentication, paginated
//! timeline/friends fetches, and the keyword-filtered push subscription.

pub mod auth;
pub mod client;
pub mod error;
pub mod export;
pub mod stream;
pub mod types;

pub use auth::{Authenticator, Session};
pub use client::Client;
pub use error::{Result, SocialError};
pub use stream::{Disposition, ListenerState, StreamListener, Streamer};
pub use types::Post;
