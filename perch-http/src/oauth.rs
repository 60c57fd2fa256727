//! OAuth 1.0a user-context request signing (HMAC-SHA1).
//!
//! Holding an [`OAuth1Keys`] is not a credential check: the remote service
//! only rejects bad key material when a signed request is first sent.

use std::borrow::Cow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::HeaderValue;
use reqwest::{Method, Url};
use sha1::Sha1;

use crate::HttpError;

type HmacSha1 = Hmac<Sha1>;

/// Twitter's encode set: everything except ALPHA / DIGIT / `-` / `.` / `_` / `~`.
const STRICT_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn percent_encode(src: &str) -> String {
    utf8_percent_encode(src, STRICT_ENCODE).to_string()
}

/// The four user-context secrets used to sign every request.
#[derive(Clone)]
pub struct OAuth1Keys {
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_secret: String,
}

// Key material never appears in Debug output.
impl fmt::Debug for OAuth1Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Keys")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

impl OAuth1Keys {
    /// Build a signing handle from the four raw secrets.
    ///
    /// Each value is trimmed of stray whitespace/quotes (a common paste
    /// accident in env files) and must be ASCII with no control characters.
    pub fn new(
        consumer_key: &str,
        consumer_secret: &str,
        access_token: &str,
        access_secret: &str,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            consumer_key: sanitize_secret(consumer_key)?,
            consumer_secret: sanitize_secret(consumer_secret)?,
            access_token: sanitize_secret(access_token)?,
            access_secret: sanitize_secret(access_secret)?,
        })
    }
}

fn sanitize_secret(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("credential contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "credential contains control characters".into(),
        ));
    }
    Ok(s)
}

/// Produce the `Authorization: OAuth ...` header for one request attempt.
///
/// `query` must list every query parameter the request will carry; `url` is
/// the request URL *before* the query string is attached. A fresh nonce and
/// timestamp are drawn per call, so retried attempts re-sign correctly.
pub fn authorization_header(
    keys: &OAuth1Keys,
    method: &Method,
    url: &Url,
    query: &[(&str, Cow<'_, str>)],
) -> Result<HeaderValue, HttpError> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string();

    let signature = sign(keys, method, url, query, &nonce, &timestamp)?;

    let header = format!(
        "OAuth oauth_consumer_key=\"{}\", oauth_nonce=\"{}\", oauth_signature=\"{}\", \
         oauth_signature_method=\"HMAC-SHA1\", oauth_timestamp=\"{}\", oauth_token=\"{}\", \
         oauth_version=\"1.0\"",
        percent_encode(&keys.consumer_key),
        percent_encode(&nonce),
        percent_encode(&signature),
        timestamp,
        percent_encode(&keys.access_token),
    );

    HeaderValue::from_str(&header)
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))
}

/// RFC 5849 signature: sorted encoded parameters, base string, HMAC-SHA1.
fn sign(
    keys: &OAuth1Keys,
    method: &Method,
    url: &Url,
    query: &[(&str, Cow<'_, str>)],
    nonce: &str,
    timestamp: &str,
) -> Result<String, HttpError> {
    let mut params: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v.as_ref())))
        .collect();
    for (k, v) in [
        ("oauth_consumer_key", keys.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", keys.access_token.as_str()),
        ("oauth_version", "1.0"),
    ] {
        params.push((percent_encode(k), percent_encode(v)));
    }
    // Sort by encoded key, then encoded value.
    params.sort();

    let param_string = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(&signature_base_url(url)),
        percent_encode(&param_string),
    );

    let signing_key = format!(
        "{}&{}",
        percent_encode(&keys.consumer_secret),
        percent_encode(&keys.access_secret),
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .map_err(|e| HttpError::Build(format!("hmac init failed: {e}")))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// scheme://host[:port]/path with no query or fragment; default ports omitted.
fn signature_base_url(url: &Url) -> String {
    let mut s = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        s.push_str(&format!(":{port}"));
    }
    s.push_str(url.path());
    s
}
