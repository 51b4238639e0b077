use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Authorization`].
///
/// Only `pending` can still change through client action; the others are decided by the
/// authority or, for `deactivated`, final.
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

/// An ACME authorization object: the authority's record of whether the account controls one
/// identifier.
///
/// See [RFC 8555 §7.1.4].
///
/// # Example JSON
///
/// A failed `dns-01` attempt carries the problem on the challenge:
///
/// ```json
/// {
///   "identifier": { "type": "dns", "value": "www.example.org" },
///   "status": "invalid",
///   "expires": "2019-01-09T08:26:43Z",
///   "challenges": [
///     {
///       "type": "dns-01",
///       "status": "invalid",
///       "error": {
///         "type": "urn:ietf:params:acme:error:dns",
///         "detail": "DNS problem: NXDOMAIN looking up TXT for _acme-challenge.www.example.org",
///         "status": 400
///       },
///       "url": "https://example.com/acme/chall/prV_B7yEyA4",
///       "token": "YsNqBWZnyYjDun3aUC2CkCopOaqZRrI5hp3tUjxPLQU"
///     }
///   ]
/// }
/// ```
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// The identifier this authorization is for.
    pub identifier: api::Identifier,

    pub status: AuthorizationStatus,

    /// RFC 3339 timestamp after which the authority considers this authorization invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    /// While pending, the challenges on offer (any one suffices); afterwards, the challenge that
    /// was validated or failed.
    pub challenges: Vec<api::Challenge>,

    /// Present and true for authorizations of a wildcard domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<bool>,
}

impl Authorization {
    /// Returns true if authorization was created for a wildcard domain.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard.unwrap_or(false)
    }

    /// Returns the first challenge of the given type (e.g. `http-01`), if one is present.
    pub fn challenge(&self, kind: &str) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == kind)
    }

    /// Returns the problem reported on the first failed challenge, if any.
    pub fn challenge_error(&self) -> Option<&api::Problem> {
        self.challenges.iter().find_map(|c| c.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_challenge_problem() {
        let auth: Authorization = serde_json::from_str(
            r#"{
                "identifier": { "type": "dns", "value": "www.example.org" },
                "status": "invalid",
                "challenges": [
                    {
                        "type": "http-01",
                        "status": "invalid",
                        "url": "https://ca.test/chall/1",
                        "token": "abc"
                    },
                    {
                        "type": "dns-01",
                        "status": "invalid",
                        "error": {
                            "type": "urn:ietf:params:acme:error:dns",
                            "detail": "NXDOMAIN",
                            "status": 400
                        },
                        "url": "https://ca.test/chall/2",
                        "token": "def"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(auth.status, AuthorizationStatus::Invalid);
        assert!(!auth.is_wildcard());
        assert_eq!(auth.challenge("dns-01").unwrap().token, "def");
        assert!(auth.challenge("tls-alpn-01").is_none());
        assert_eq!(auth.challenge_error().unwrap().short_type(), "dns");
    }
}
