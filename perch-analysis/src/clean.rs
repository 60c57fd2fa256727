//! Text normalisation ahead of polarity scoring.

use once_cell::sync::Lazy;
use regex::Regex;

// Mentions, single stray symbols, and URLs all collapse to spaces. The
// alternation order matters: the symbol class must not eat the scheme
// punctuation before the URL branch gets a chance at the whole token.
static NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(@[A-Za-z0-9]+)|([^0-9A-Za-z \t])|(\w+://\S+)").unwrap());

/// Strip @-mentions, URLs, and non-alphanumeric characters, then collapse
/// runs of whitespace into single spaces and trim.
///
/// Pure and idempotent; used only as the preprocessing step before
/// sentiment scoring. Tables keep the original text untouched.
///
/// ```
/// use perch_analysis::clean;
///
/// assert_eq!(
///     clean("Check this out! http://x.co @bob #cool"),
///     "Check this out cool"
/// );
/// ```
pub fn clean(text: &str) -> String {
    let scrubbed = NOISE_RE.replace_all(text, " ");
    scrubbed.split_whitespace().collect::<Vec<_>>().join(" ")
}
