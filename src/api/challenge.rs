use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// An ACME challenge object, one way of proving control of an identifier.
///
/// See [RFC 8555 §7.1.5].
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "http-01",
///   "status": "valid",
///   "url": "https://example.com/acme/chall/prV_B7yEyA4",
///   "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w",
///   "validated": "2014-12-01T12:05:58.16Z"
/// }
/// ```
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Challenge type, e.g. `http-01`, `dns-01` or `tls-alpn-01`.
    #[serde(rename = "type")]
    pub _type: String,

    /// URL to post to in order to start validation.
    pub url: String,

    pub status: ChallengeStatus,

    /// RFC 3339 timestamp of successful validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<String>,

    /// Why validation failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    /// Random value identifying the challenge; part of the key authorization.
    ///
    /// Empty for challenge types without a token.
    #[serde(default)]
    pub token: String,
}

impl Challenge {
    /// Returns true while the authority still waits for the client to respond.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, ChallengeStatus::Pending)
    }
}
