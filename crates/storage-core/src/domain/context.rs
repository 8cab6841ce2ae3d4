//! Per-call context handed to `Provider` methods (`spec.md` §3 `Context`).

use serde::{Deserialize, Serialize};

/// The account's stored credentials, as handed to the back-end so it can
/// authenticate its upstream calls. The core never inspects the contents;
/// it is opaque cargo from the authentication broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    Absent,
    OAuth1 { token: String, token_secret: String },
    OAuth2 { access_token: String },
    Password { username: String, password: String },
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::Absent
    }
}

/// `(uid, pid, label, credentials)` bundle passed to every `Provider`
/// method so back-ends can perform ACL checks (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Context {
    pub uid: u32,
    pub pid: u32,
    pub label: String,
    pub credentials: Credentials,
}

impl Context {
    pub fn new(uid: u32, pid: u32, label: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            uid,
            pid,
            label: label.into(),
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_credentials_are_absent() {
        assert_eq!(Credentials::default(), Credentials::Absent);
    }
}
