//! Keyword-filtered push subscription and its listener state machine.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use perch_http::{Auth, HttpClient, HttpError, Method, RequestOpts, StatusCode};

use crate::auth::Authenticator;
use crate::error::Result;

const DEFAULT_STREAM_BASE: &str = "https://stream.twitter.com";

/// Pause between subscription reopen attempts while the listener is Active.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// What the subscription driver should do after a listener callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Active,
    Stopped,
}

/// Appends raw payloads to a target file and decides whether the
/// subscription keeps running.
pub struct StreamListener {
    out: File,
    state: ListenerState,
}

impl StreamListener {
    /// Open `target` in append mode; the handle lives as long as the stream.
    pub fn create(target: &Path) -> Result<Self> {
        let out = OpenOptions::new().create(true).append(true).open(target)?;
        Ok(Self {
            out,
            state: ListenerState::Active,
        })
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Append one raw payload plus a newline terminator, no added framing.
    pub fn on_payload(&mut self, raw: &str) -> Result<Disposition> {
        self.out.write_all(raw.as_bytes())?;
        self.out.write_all(b"\n")?;
        Ok(Disposition::Continue)
    }

    /// React to an error status from the remote.
    ///
    /// 420 (rate-limit violation on the push path) terminates the
    /// subscription; any other status is logged and the subscription stays
    /// up.
    // FIXME: only 420 stops the stream today; confirm with the product owner
    // whether other terminal statuses (401, 404) should stop as well instead
    // of retrying forever.
    pub fn on_status(&mut self, status: StatusCode) -> Disposition {
        if status.as_u16() == 420 {
            tracing::warn!(%status, "stream.rate_limited.stopping");
            self.state = ListenerState::Stopped;
            return Disposition::Stop;
        }
        tracing::warn!(%status, "stream.error.continuing");
        Disposition::Continue
    }
}

/// Best-effort peek at the `text` field of a raw payload, for log lines.
fn peek_text(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("text")?.as_str().map(|s| s.to_string())
}

/// Opens a filtered push subscription and drives a [`StreamListener`]
/// until it stops the subscription.
pub struct Streamer {
    authenticator: Authenticator,
    base: String,
}

impl Streamer {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator,
            base: DEFAULT_STREAM_BASE.to_string(),
        }
    }

    /// Anchor the streamer at a non-default base URL (tests, proxies).
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = base.to_string();
        self
    }

    /// Stream posts matching `keywords` into `target`, returning once the
    /// listener transitions to Stopped.
    ///
    /// Remote-side errors never propagate from here: refused subscriptions
    /// go through the listener's status policy, and dropped connections are
    /// reopened while the listener stays Active. Only authentication
    /// failures at session construction and local file errors surface.
    pub async fn stream(&self, target: &Path, keywords: &[String]) -> Result<()> {
        let session = self.authenticator.authenticate()?;
        let http = HttpClient::new(&self.base)?;
        let mut listener = StreamListener::create(target)?;
        let track = keywords.join(",");

        tracing::info!(target_file = %target.display(), track = %track, "stream.start");

        'subscription: while listener.state() == ListenerState::Active {
            let query: Vec<(&str, Cow<'_, str>)> = vec![("track", Cow::from(track.as_str()))];
            let opened = http
                .open_line_stream(
                    Method::POST,
                    "1.1/statuses/filter.json",
                    RequestOpts {
                        auth: Some(Auth::OAuth1(session.keys())),
                        query: Some(query),
                        ..Default::default()
                    },
                )
                .await;

            let mut lines = match opened {
                Ok(lines) => lines,
                Err(HttpError::Api { status, .. }) => {
                    match listener.on_status(status) {
                        Disposition::Stop => break 'subscription,
                        Disposition::Continue => {
                            tokio::time::sleep(RECONNECT_DELAY).await;
                            continue 'subscription;
                        }
                    }
                }
                Err(e) => {
                    // Transport-level failure to connect; treated like a
                    // dropped connection.
                    tracing::warn!(error = %e, "stream.connect.failed");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue 'subscription;
                }
            };

            while let Some(item) = lines.next().await {
                match item {
                    Ok(line) => {
                        tracing::debug!(text = ?peek_text(&line), "stream.payload");
                        if listener.on_payload(&line)? == Disposition::Stop {
                            break 'subscription;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stream.connection.lost");
                        break;
                    }
                }
            }

            if listener.state() == ListenerState::Active {
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }

        tracing::info!("stream.stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use perch_config::Credentials;
    use std::io::Read;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    fn read_to_string(path: &Path) -> String {
        let mut s = String::new();
        File::open(path).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn payload_then_420_appends_and_stops() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut listener = StreamListener::create(tmp.path()).unwrap();

        assert_eq!(
            listener.on_payload(r#"{"text":"hello"}"#).unwrap(),
            Disposition::Continue
        );
        assert_eq!(listener.on_status(status(420)), Disposition::Stop);
        assert_eq!(listener.state(), ListenerState::Stopped);

        assert_eq!(read_to_string(tmp.path()), "{\"text\":\"hello\"}\n");
    }

    #[test]
    fn payload_then_500_appends_and_stays_active() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut listener = StreamListener::create(tmp.path()).unwrap();

        listener.on_payload(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(listener.on_status(status(500)), Disposition::Continue);
        assert_eq!(listener.state(), ListenerState::Active);

        assert_eq!(read_to_string(tmp.path()), "{\"text\":\"hello\"}\n");
    }

    #[test]
    fn appends_preserve_existing_content() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "earlier\n").unwrap();

        let mut listener = StreamListener::create(tmp.path()).unwrap();
        listener.on_payload("later").unwrap();

        assert_eq!(read_to_string(tmp.path()), "earlier\nlater\n");
    }

    #[test]
    fn peek_text_reads_json_payloads_only() {
        assert_eq!(
            peek_text(r#"{"text":"hi","id":1}"#).as_deref(),
            Some("hi")
        );
        assert_eq!(peek_text("not json"), None);
        assert_eq!(peek_text(r#"{"delete":{}}"#), None);
    }

    #[tokio::test]
    async fn streamer_writes_payloads_then_stops_on_420() {
        let server = MockServer::start().await;
        // First connection delivers two payloads and closes.
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"text\":\"one\"}\n{\"text\":\"two\"}\n", "application/json"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // The reopen attempt is refused with 420, stopping the listener.
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .respond_with(ResponseTemplate::new(420))
            .mount(&server)
            .await;

        let authenticator = Authenticator::new(Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_secret: "as".into(),
        });
        let tmp = tempfile::NamedTempFile::new().unwrap();

        Streamer::new(authenticator)
            .with_base(&server.uri())
            .stream(tmp.path(), &["rustlang".to_string()])
            .await
            .unwrap();

        assert_eq!(
            read_to_string(tmp.path()),
            "{\"text\":\"one\"}\n{\"text\":\"two\"}\n"
        );
    }
}
