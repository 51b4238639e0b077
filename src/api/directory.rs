use serde::{Deserialize, Serialize};

use crate::dir::Operation;

/// Directory object for ACME client self-configuration.
///
/// Every endpoint is optional on the wire; an authority that omits one does not support that
/// operation.
///
/// See [RFC 8555 §7.1.1].
///
/// # Example JSON
///
/// ```json
/// {
///   "newNonce": "https://example.com/acme/new-nonce",
///   "newAccount": "https://example.com/acme/new-account",
///   "newOrder": "https://example.com/acme/new-order",
///   "newAuthz": "https://example.com/acme/new-authz",
///   "revokeCert": "https://example.com/acme/revoke-cert",
///   "keyChange": "https://example.com/acme/key-change",
///   "meta": {
///     "termsOfService": "https://example.com/acme/terms/2017-5-30",
///     "website": "https://www.example.com/",
///     "caaIdentities": ["example.com"],
///     "externalAccountRequired": false
///   }
/// }
/// ```
///
/// [RFC 8555 §7.1.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_nonce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_order: Option<String>,

    /// Only present on authorities that support [pre-authorization].
    ///
    /// [pre-authorization]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.4.1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_authz: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoke_cert: Option<String>,

    /// Target of account key rollover requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_change: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DirectoryMeta>,
}

impl Directory {
    /// Returns the endpoint advertised for `op`, if any.
    pub fn endpoint(&self, op: Operation) -> Option<&str> {
        let url = match op {
            Operation::NewNonce => &self.new_nonce,
            Operation::NewAccount => &self.new_account,
            Operation::NewOrder => &self.new_order,
            Operation::NewAuthz => &self.new_authz,
            Operation::RevokeCert => &self.revoke_cert,
            Operation::KeyChange => &self.key_change,
        };

        url.as_deref()
    }
}

/// Informational part of the directory, see [RFC 8555 §9.7.6].
///
/// [RFC 8555 §9.7.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-9.7.6
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
    /// Current terms of service; agreeing to them is part of account registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    /// Domains the authority accepts in CAA records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caa_identities: Option<Vec<String>>,

    /// Set when new accounts must be bound to an account held outside ACME.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_account_required: Option<bool>,
}

impl DirectoryMeta {
    pub fn external_account_required(&self) -> bool {
        self.external_account_required.unwrap_or(false)
    }
}
