//! Tabulation of fetched posts, plus the appended sentiment column.

use std::fmt;

use perch_social::Post;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::sentiment::{classify_sentiment, PolarityScorer, SentimentLabel};

const COLUMNS: [&str; 6] = ["tweets", "Source", "date", "len", "likes", "Sentiment"];

/// Widest rendering of the text column before it is shortened.
const TEXT_DISPLAY_MAX: usize = 48;

/// One row. Text is kept exactly as fetched; `char_len` is derived from it
/// at tabulation time.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub text: String,
    pub source: String,
    pub created_at: OffsetDateTime,
    pub char_len: usize,
    pub likes: u64,
    pub sentiment: Option<SentimentLabel>,
}

/// Ordered rows, one per fetched post, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct PostTable {
    rows: Vec<PostRow>,
}

impl PostTable {
    pub fn rows(&self) -> &[PostRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Compute the sentiment column over the text column, in row order.
    /// This is the only mutation a built table ever sees.
    pub fn apply_sentiment<S: PolarityScorer + ?Sized>(&mut self, scorer: &S) {
        for row in &mut self.rows {
            row.sentiment = Some(classify_sentiment(scorer, &row.text));
        }
        tracing::debug!(rows = self.rows.len(), "table.sentiment.applied");
    }
}

/// Build one row per post, in input order.
///
/// The sentiment column starts empty; [`PostTable::apply_sentiment`] fills
/// it as a separate pass.
pub fn tabulate(posts: &[Post]) -> PostTable {
    let rows = posts
        .iter()
        .map(|post| PostRow {
            text: post.text.clone(),
            source: post.source.clone(),
            created_at: post.created_at,
            char_len: post.char_len(),
            likes: post.favorite_count,
            sentiment: None,
        })
        .collect();
    PostTable { rows }
}

// Embedded newlines would break row alignment, so they render as spaces.
fn shorten(s: &str, max: usize) -> String {
    let flat = s.replace(['\r', '\n'], " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let mut out: String = flat.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

impl fmt::Display for PostTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<[String; 6]> = self
            .rows
            .iter()
            .map(|row| {
                [
                    shorten(&row.text, TEXT_DISPLAY_MAX),
                    row.source.clone(),
                    row.created_at.format(&Rfc3339).unwrap_or_default(),
                    row.char_len.to_string(),
                    row.likes.to_string(),
                    row.sentiment.map(|s| s.to_string()).unwrap_or_default(),
                ]
            })
            .collect();

        let mut widths: [usize; 6] = COLUMNS.map(str::len);
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        for (i, (header, &width)) in COLUMNS.iter().zip(widths.iter()).enumerate() {
            if i > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{header:width$}")?;
        }
        writeln!(f)?;

        for row in &cells {
            for (i, (cell, &width)) in row.iter().zip(widths.iter()).enumerate() {
                if i > 0 {
                    write!(f, "  ")?;
                }
                write!(f, "{cell:width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::PolarityScorer;
    use time::macros::datetime;

    fn post(id: u64, text: &str, likes: u64) -> Post {
        Post {
            id,
            text: text.to_string(),
            source: "Perch for iOS".to_string(),
            created_at: datetime!(2018-10-10 20:19:24 UTC),
            favorite_count: likes,
        }
    }

    struct Canned;

    impl PolarityScorer for Canned {
        fn polarity(&self, text: &str) -> f64 {
            if text.contains("good") {
                0.5
            } else if text.contains("bad") {
                -0.2
            } else {
                0.0
            }
        }
    }

    #[test]
    fn preserves_length_and_order() {
        let posts = vec![post(3, "first", 7), post(2, "second", 0), post(1, "third", 9)];
        let table = tabulate(&posts);

        assert_eq!(table.len(), posts.len());
        for (row, post) in table.rows().iter().zip(&posts) {
            assert_eq!(row.text, post.text);
            assert_eq!(row.source, post.source);
            assert_eq!(row.created_at, post.created_at);
            assert_eq!(row.likes, post.favorite_count);
            assert_eq!(row.char_len, post.text.chars().count());
        }
    }

    #[test]
    fn sentiment_is_a_separate_pass_in_row_order() {
        let posts = vec![
            post(3, "good vibes", 1),
            post(2, "bad vibes", 2),
            post(1, "vibes", 3),
        ];
        let mut table = tabulate(&posts);
        assert!(table.rows().iter().all(|r| r.sentiment.is_none()));

        table.apply_sentiment(&Canned);
        let labels: Vec<SentimentLabel> =
            table.rows().iter().filter_map(|r| r.sentiment).collect();
        assert_eq!(
            labels,
            vec![
                SentimentLabel::Positive,
                SentimentLabel::Negative,
                SentimentLabel::Neutral,
            ]
        );
    }

    #[test]
    fn length_column_counts_characters_of_fetched_text() {
        let posts = vec![post(1, "caf\u{00e9} \u{1F600}", 0)];
        let table = tabulate(&posts);
        assert_eq!(table.rows()[0].char_len, 6);
        // The stored text is untouched.
        assert_eq!(table.rows()[0].text, "caf\u{00e9} \u{1F600}");
    }

    #[test]
    fn empty_batch_tabulates_to_empty_table() {
        let table = tabulate(&[]);
        assert!(table.is_empty());
        let rendered = table.to_string();
        assert_eq!(rendered.lines().count(), 1); // header only
    }

    #[test]
    fn display_renders_header_and_one_line_per_row() {
        let mut table = tabulate(&[post(2, "good stuff", 4), post(1, "meh", 0)]);
        table.apply_sentiment(&Canned);

        let rendered = table.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("tweets"));
        assert!(lines[0].contains("Sentiment"));
        assert!(lines[1].contains("positive"));
        assert!(lines[2].contains("neutral"));
    }

    #[test]
    fn long_text_is_shortened_in_display_only() {
        let long = "x".repeat(80);
        let table = tabulate(&[post(1, &long, 0)]);
        assert_eq!(table.rows()[0].char_len, 80);
        let rendered = table.to_string();
        assert!(rendered.contains("..."));
        assert!(!rendered.contains(&long));
    }
}
