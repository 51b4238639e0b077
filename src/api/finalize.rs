use serde::{Deserialize, Serialize};

use crate::util::base64url;

/// Payload posted to an order's finalize URL.
///
/// See [RFC 8555 §7.4].
///
/// [RFC 8555 §7.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalize {
    /// base64url of the DER encoded CSR (no PEM armor).
    pub csr: String,
}

impl Finalize {
    pub(crate) fn from_der(csr_der: &[u8]) -> Self {
        Self {
            csr: base64url(csr_der),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_is_unpadded_base64url() {
        let finalize = Finalize::from_der(&[0xfb, 0xff]);
        assert_eq!(serde_json::to_string(&finalize).unwrap(), r#"{"csr":"-_8"}"#);
    }
}
