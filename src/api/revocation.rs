use serde::{Deserialize, Serialize};

use crate::util::base64url;

/// Payload posted to the `revokeCert` endpoint.
///
/// See [RFC 8555 §7.6].
///
/// [RFC 8555 §7.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// base64url of the DER encoded certificate (no PEM armor).
    pub certificate: String,

    /// [RFC 5280 §5.3.1] reason code; absent means unspecified.
    ///
    /// [RFC 5280 §5.3.1]: https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<u32>,
}

impl Revocation {
    pub(crate) fn from_der(certificate_der: &[u8], reason: Option<u32>) -> Self {
        Self {
            certificate: base64url(certificate_der),
            reason,
        }
    }
}
