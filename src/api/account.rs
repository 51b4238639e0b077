use serde::{Deserialize, Serialize};

/// The status of an [`Account`].
///
/// `deactivated` is client initiated, `revoked` server initiated. Both are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Valid,
    Deactivated,
    Revoked,
}

/// An ACME account resource.
///
/// The same shape is posted to `newAccount` and to the account URL, and returned by both. Fields
/// the client leaves unset are omitted from requests.
///
/// See [RFC 8555 §7.1.2].
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "valid",
///   "contact": [
///     "mailto:cert-admin@example.com",
///     "mailto:admin@example.com"
///   ],
///   "termsOfServiceAgreed": true,
///   "orders": "https://example.com/acme/acct/evOfKhNU60wg/orders"
/// }
/// ```
///
/// [RFC 8555 §7.1.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service_agreed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_return_existing: Option<bool>,

    /// URL of the account's order list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

fn contact_list(contacts: &[&str]) -> Vec<String> {
    contacts.iter().map(|&c| c.to_owned()).collect()
}

impl Account {
    /// `newAccount` payload registering `contacts`. An empty list omits the field.
    pub(crate) fn registration(contacts: &[&str], agree_terms: bool) -> Self {
        Self {
            contact: (!contacts.is_empty()).then(|| contact_list(contacts)),
            terms_of_service_agreed: Some(agree_terms),
            ..Default::default()
        }
    }

    /// `newAccount` payload that only looks up an account.
    pub(crate) fn lookup() -> Self {
        Self {
            only_return_existing: Some(true),
            ..Default::default()
        }
    }

    /// Account update payload. Terms agreement is only sent when given, it cannot be withdrawn.
    pub(crate) fn update(contacts: &[&str], agree_terms: bool) -> Self {
        Self {
            contact: Some(contact_list(contacts)),
            terms_of_service_agreed: agree_terms.then_some(true),
            ..Default::default()
        }
    }

    pub fn is_status_valid(&self) -> bool {
        self.status == Some(AccountStatus::Valid)
    }

    pub fn is_status_deactivated(&self) -> bool {
        self.status == Some(AccountStatus::Deactivated)
    }

    pub fn is_status_revoked(&self) -> bool {
        self.status == Some(AccountStatus::Revoked)
    }

    pub fn terms_of_service_agreed(&self) -> bool {
        self.terms_of_service_agreed.unwrap_or(false)
    }
}
