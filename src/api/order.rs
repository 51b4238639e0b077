use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, error::*};

/// The status of an [`api::Order`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    /// Returns true for `valid` and `invalid`.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Valid | OrderStatus::Invalid)
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Ready => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Valid | OrderStatus::Invalid => 3,
        }
    }

    /// Whether an order observed in `self` may next be observed in `next`.
    ///
    /// Terminal states never change, any other state may fail to `invalid`, and otherwise the
    /// status only moves forward.
    pub fn can_become(self, next: OrderStatus) -> bool {
        if self == next {
            return true;
        }

        if self.is_terminal() {
            return false;
        }

        next == OrderStatus::Invalid || next.rank() > self.rank()
    }
}

/// An ACME order object.
///
/// Represents a client's request for a certificate and is used to track the progress of that order
/// through to issuance.
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "pending",
///   "expires": "2019-01-09T08:26:43.570360537Z",
///   "identifiers": [
///     {
///       "type": "dns",
///       "value": "www.example.org"
///     }
///   ],
///   "authorizations": [
///     "https://example.com/acme/authz/YTqpYUthlVfwBncUufE8IRA2TkzZkN4eYWWLMSRqcSs"
///   ],
///   "finalize": "https://example.com/acme/finalize/7738992/18234324"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    /// Some authorities leave this out of responses.
    #[serde(default)]
    pub identifiers: Vec<api::Identifier>,

    /// Requested value of the certificate's `notBefore` field.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<OffsetDateTime>,

    /// Requested value of the certificate's `notAfter` field.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_after: Option<OffsetDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub finalize: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Order {
    pub(crate) fn from_identifiers(
        identifiers: Vec<api::Identifier>,
        not_before: Option<OffsetDateTime>,
        not_after: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            identifiers,
            not_before,
            not_after,
            ..Default::default()
        }
    }

    /// Returns all domains associated with this order.
    pub fn domains(&self) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(|identifier| identifier.value.as_str())
            .collect()
    }

    // Let's Encrypt was observed to return domains in alternate order which
    // may flip primary with SAN(s).
    //
    // This overwrites self without changing the order of the domains.
    //
    // A response without identifiers keeps the ones already known.
    pub(crate) fn overwrite(&mut self, mut from_api: Self) -> Result<()> {
        if from_api.identifiers.is_empty() {
            from_api.identifiers = std::mem::take(&mut self.identifiers);
            *self = from_api;
            return Ok(());
        }

        // Make sure the lists are the same.
        if from_api.identifiers.len() != self.identifiers.len()
            || from_api
                .identifiers
                .iter()
                .any(|id| !self.identifiers.contains(id))
        {
            return Err(Error::UnexpectedResponse(format!(
                "order identifier mismatch: had {:?} and got {:?}",
                self.identifiers, from_api.identifiers
            )));
        }

        // Then preserve the original order.
        from_api.identifiers = std::mem::take(&mut self.identifiers);
        *self = from_api;
        Ok(())
    }
}
