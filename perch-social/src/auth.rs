//! Credential handling. Construction is offline: the remote only rejects
//! bad key material once a signed request is sent.

use perch_config::Credentials;
use perch_http::OAuth1Keys;

use crate::error::{Result, SocialError};

/// Holds the four user-context secrets and mints signing sessions.
pub struct Authenticator {
    credentials: Credentials,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Produce a credential-bearing [`Session`].
    ///
    /// No network call happens here; credentials the remote does not accept
    /// surface as [`SocialError::Auth`] the first time the session is used.
    /// Only structurally unusable key material (non-ASCII, control bytes)
    /// fails at this point.
    pub fn authenticate(&self) -> Result<Session> {
        let keys = OAuth1Keys::new(
            &self.credentials.consumer_key,
            &self.credentials.consumer_secret,
            &self.credentials.access_token,
            &self.credentials.access_secret,
        )
        .map_err(|e| SocialError::Auth(e.to_string()))?;
        Ok(Session { keys })
    }
}

/// An authenticated session handle; cheap to clone, safe to log.
#[derive(Clone, Debug)]
pub struct Session {
    keys: OAuth1Keys,
}

impl Session {
    pub(crate) fn keys(&self) -> &OAuth1Keys {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_secret: "as".into(),
        }
    }

    #[test]
    fn authenticate_is_offline_and_succeeds() {
        let session = Authenticator::new(credentials()).authenticate();
        assert!(session.is_ok());
    }

    #[test]
    fn non_ascii_credentials_fail_up_front() {
        let mut creds = credentials();
        creds.access_token = "tok\u{00e9}n".into();
        let err = Authenticator::new(creds).authenticate().unwrap_err();
        assert!(matches!(err, SocialError::Auth(_)));
    }

    #[test]
    fn session_debug_redacts_key_material() {
        let creds = Credentials {
            consumer_key: "ck-secret-value".into(),
            consumer_secret: "cs-secret-value".into(),
            access_token: "at-secret-value".into(),
            access_secret: "as-secret-value".into(),
        };
        let session = Authenticator::new(creds).authenticate().unwrap();
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
