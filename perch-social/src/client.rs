//! Paginated retrieval operations, bounded by a requested count.

use std::borrow::Cow;

use perch_http::{Auth, HttpClient, RequestOpts};

use crate::auth::Session;
use crate::error::Result;
use crate::types::{FriendIdsPage, Post};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Largest page the timeline endpoint serves per request.
const TIMELINE_PAGE_MAX: usize = 200;

/// Wraps an authenticated [`Session`] and exposes bounded fetches.
pub struct Client {
    http: HttpClient,
    session: Session,
}

impl Client {
    pub fn new(session: Session) -> Result<Self> {
        Self::with_base(session, DEFAULT_API_BASE)
    }

    /// Anchor the client at a non-default base URL (tests, proxies).
    pub fn with_base(session: Session, base: &str) -> Result<Self> {
        let http = HttpClient::new(base)?;
        Ok(Self { http, session })
    }

    /// Fetch up to `count` of the subject's most recent posts, newest first.
    ///
    /// Pages through the listing by stepping `max_id` below the oldest post
    /// seen, until `count` posts are collected or a page comes back empty.
    /// `count == 0` fetches none and performs no network call.
    pub async fn fetch_timeline(&self, subject: &str, count: usize) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = Vec::with_capacity(count.min(TIMELINE_PAGE_MAX));
        let mut max_id: Option<u64> = None;

        while posts.len() < count {
            let page_size = (count - posts.len()).min(TIMELINE_PAGE_MAX);
            let mut query: Vec<(&str, Cow<'_, str>)> = vec![
                ("screen_name", subject.into()),
                ("count", page_size.to_string().into()),
            ];
            if let Some(id) = max_id {
                query.push(("max_id", id.to_string().into()));
            }

            let page: Vec<Post> = self
                .http
                .get_json(
                    "1.1/statuses/user_timeline.json",
                    RequestOpts {
                        auth: Some(Auth::OAuth1(self.session.keys())),
                        query: Some(query),
                        ..Default::default()
                    },
                )
                .await?;

            let Some(oldest) = page.iter().map(|p| p.id).min() else {
                break; // source exhausted
            };
            // The next page would repeat the oldest post unless we step past it.
            max_id = Some(oldest.saturating_sub(1));

            tracing::debug!(
                subject,
                page_len = page.len(),
                collected = posts.len() + page.len(),
                "timeline.page"
            );
            posts.extend(page);
        }

        posts.truncate(count);
        Ok(posts)
    }

    /// Fetch up to `count` ids of accounts the subject follows.
    ///
    /// Pages through the cursor-based listing until `count` ids are
    /// collected or the cursor comes back zero. `count == 0` fetches none
    /// and performs no network call.
    pub async fn fetch_friends(&self, subject: &str, count: usize) -> Result<Vec<u64>> {
        let mut ids: Vec<u64> = Vec::new();
        let mut cursor: i64 = -1;

        while ids.len() < count {
            let query: Vec<(&str, Cow<'_, str>)> = vec![
                ("screen_name", subject.into()),
                ("cursor", cursor.to_string().into()),
            ];

            let page: FriendIdsPage = self
                .http
                .get_json(
                    "1.1/friends/ids.json",
                    RequestOpts {
                        auth: Some(Auth::OAuth1(self.session.keys())),
                        query: Some(query),
                        ..Default::default()
                    },
                )
                .await?;

            if page.ids.is_empty() {
                break;
            }
            tracing::debug!(
                subject,
                page_len = page.ids.len(),
                collected = ids.len() + page.ids.len(),
                "friends.page"
            );
            ids.extend(page.ids);
            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }

        ids.truncate(count);
        Ok(ids)
    }
}
