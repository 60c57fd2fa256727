//! Typed post model, validated at the deserialization boundary.
//!
//! Every field the table downstream needs is required here: a payload with
//! a missing field fails the whole batch instead of defaulting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// `created_at` wire format, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] \
     [offset_hour sign:mandatory][offset_minute] [year]"
);

// The wire `source` is an HTML anchor around the application name.
static SOURCE_ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<a[^>]*>(?P<label>.*)</a>$").unwrap());

/// One fetched post. Immutable once deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: u64,
    pub text: String,
    /// Display name of the client application that created the post.
    #[serde(deserialize_with = "de_source")]
    pub source: String,
    #[serde(deserialize_with = "de_created_at")]
    pub created_at: OffsetDateTime,
    pub favorite_count: u64,
}

impl Post {
    /// Character length of the text as fetched (Unicode scalars, not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn de_source<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    Ok(strip_source_anchor(&raw))
}

fn strip_source_anchor(raw: &str) -> String {
    match SOURCE_ANCHOR_RE.captures(raw.trim()) {
        Some(caps) => caps["label"].to_string(),
        None => raw.to_string(),
    }
}

fn de_created_at<'de, D>(de: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    OffsetDateTime::parse(&raw, CREATED_AT_FORMAT).map_err(serde::de::Error::custom)
}

/// One page of friend ids plus the cursor for the next page (0 = done).
#[derive(Debug, Deserialize)]
pub struct FriendIdsPage {
    pub ids: Vec<u64>,
    pub next_cursor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const FULL_POST: &str = r#"{
        "id": 1050118621198921728,
        "text": "To make room for more expression, we will now count all emojis as equal.",
        "source": "<a href=\"http://twitter.com\" rel=\"nofollow\">Twitter Web Client</a>",
        "created_at": "Wed Oct 10 20:19:24 +0000 2018",
        "favorite_count": 12,
        "retweet_count": 3,
        "lang": "en"
    }"#;

    #[test]
    fn deserializes_a_full_payload() {
        let post: Post = serde_json::from_str(FULL_POST).unwrap();
        assert_eq!(post.id, 1050118621198921728);
        assert_eq!(post.source, "Twitter Web Client");
        assert_eq!(post.created_at, datetime!(2018-10-10 20:19:24 UTC));
        assert_eq!(post.favorite_count, 12);
    }

    #[test]
    fn missing_field_fails_the_payload() {
        let truncated = r#"{"id": 1, "text": "hi", "source": "web", "favorite_count": 0}"#;
        assert!(serde_json::from_str::<Post>(truncated).is_err());
    }

    #[test]
    fn bad_created_at_fails_the_payload() {
        let bad = FULL_POST.replace("Wed Oct 10 20:19:24 +0000 2018", "2018-10-10T20:19:24Z");
        assert!(serde_json::from_str::<Post>(&bad).is_err());
    }

    #[test]
    fn source_without_anchor_is_kept_verbatim() {
        assert_eq!(strip_source_anchor("Instagram"), "Instagram");
        assert_eq!(
            strip_source_anchor("<a href=\"https://x.co\">Perch for iOS</a>"),
            "Perch for iOS"
        );
    }

    #[test]
    fn char_len_counts_scalars_not_bytes() {
        let post: Post = serde_json::from_str(
            &FULL_POST.replace(
                "To make room for more expression, we will now count all emojis as equal.",
                "caf\u{00e9} \u{1F600}",
            ),
        )
        .unwrap();
        assert_eq!(post.char_len(), 6);
        assert!(post.text.len() > 6);
    }

    #[test]
    fn friend_ids_page_parses_cursors() {
        let page: FriendIdsPage = serde_json::from_str(
            r#"{"ids": [101, 102], "next_cursor": 1374004777531007833, "next_cursor_str": "1374004777531007833", "previous_cursor": 0}"#,
        )
        .unwrap();
        assert_eq!(page.ids, vec![101, 102]);
        assert_ne!(page.next_cursor, 0);
    }
}
