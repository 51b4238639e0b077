//! See [RFC 8555 §6.2](https://datatracker.ietf.org/doc/html/rfc8555#section-6.2).

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{error::*, key::AccountKey, util::base64url};

/// How the signer identifies itself in the protected header.
///
/// > For newAccount requests, and for revokeCert requests authenticated by a certificate key,
/// there MUST be a "jwk" field. This field MUST contain the public key corresponding to the
/// private key used to sign the JWS.
/// >
/// > For all other requests, the request is signed using an existing account, and there MUST be a
/// "kid" field. This field MUST contain the account URL received by POSTing to the newAccount
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBinding<'a> {
    /// Embed the signing key's public JWK.
    Jwk,

    /// Reference the account by its resource URL.
    Kid(&'a str),
}

/// JWS Protected Header scheme as defined in [RFC 8555 §6.2].
///
/// [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsProtectedHeader {
    /// Algorithm.
    ///
    /// This field MUST NOT contain "none" or a Message Authentication Code (MAC) algorithm.
    pub alg: String,

    /// A unique value that enables the verifier of a JWS to recognize when replay has occurred.
    ///
    /// Absent only for the inner JWS of a key change, which is never sent on its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// The URL to which this JWS object is directed.
    pub url: String,

    /// JSON Web Key.
    ///
    /// Mutually exclusive with `kid` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,

    /// Key ID.
    ///
    /// Mutually exclusive with `jwk` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwsProtectedHeader {
    pub(crate) fn new(
        key: &AccountKey,
        binding: KeyBinding<'_>,
        url: &str,
        nonce: Option<String>,
    ) -> Self {
        let (jwk, kid) = match binding {
            KeyBinding::Jwk => (Some(key.public_jwk().clone()), None),
            KeyBinding::Kid(kid) => (None, Some(kid.to_owned())),
        };

        JwsProtectedHeader {
            alg: key.algorithm().as_str().to_owned(),
            nonce,
            url: url.to_owned(),
            jwk,
            kid,
        }
    }
}

/// Public JSON Web Key, see [RFC 7517].
///
/// [RFC 7517]: https://datatracker.ietf.org/doc/html/rfc7517
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "EC")]
    Ec { crv: String, x: String, y: String },

    #[serde(rename = "RSA")]
    Rsa { e: String, n: String },
}

impl Jwk {
    pub(crate) fn ec(crv: &str, x: &[u8], y: &[u8]) -> Self {
        Jwk::Ec {
            crv: crv.to_owned(),
            x: base64url(x),
            y: base64url(y),
        }
    }

    /// Base64url encoded SHA-256 of the key's canonical form, see [RFC 7638].
    ///
    /// [RFC 7638]: https://datatracker.ietf.org/doc/html/rfc7638
    pub fn thumbprint(&self) -> Result<String> {
        let canonical = match self {
            Jwk::Ec { crv, x, y } => serde_json::to_string(&EcThumb {
                crv,
                kty: "EC",
                x,
                y,
            })?,
            Jwk::Rsa { e, n } => serde_json::to_string(&RsaThumb { e, kty: "RSA", n })?,
        };

        Ok(base64url(&Sha256::digest(canonical)))
    }
}

// LEXICAL ORDER OF FIELDS MATTER!
#[derive(Serialize)]
struct EcThumb<'a> {
    crv: &'a str,
    kty: &'a str,
    x: &'a str,
    y: &'a str,
}

// LEXICAL ORDER OF FIELDS MATTER!
#[derive(Serialize)]
struct RsaThumb<'a> {
    e: &'a str,
    kty: &'a str,
    n: &'a str,
}

/// Flattened JWS JSON serialization.
///
/// <https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedJsonJws {
    protected: String,
    payload: String,
    signature: String,
}

impl FlattenedJsonJws {
    pub(crate) fn new(protected: String, payload: String, signature: String) -> Self {
        FlattenedJsonJws {
            protected,
            payload,
            signature,
        }
    }

    /// Base64url encoded protected header.
    pub fn protected(&self) -> &str {
        &self.protected
    }

    /// Base64url encoded payload; empty for POST-as-GET.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Base64url encoded signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Construct JWS with protected header according to [RFC 7515 §5.1].
///
/// An empty `payload` is kept as the empty string, which is how POST-as-GET requests are
/// expressed.
///
/// [RFC 7515 §5.1]: https://datatracker.ietf.org/doc/html/rfc7515#section-5.1
pub(crate) fn jws_with(
    protected: &JwsProtectedHeader,
    key: &AccountKey,
    payload: &[u8],
) -> Result<FlattenedJsonJws> {
    let header = base64url(&serde_json::to_vec(protected)?);

    let payload = if payload.is_empty() {
        String::new()
    } else {
        base64url(payload)
    };

    let to_sign = format!("{header}.{payload}");
    let signature = base64url(&key.sign(to_sign.as_bytes())?);

    Ok(FlattenedJsonJws::new(header, payload, signature))
}

#[cfg(test)]
mod tests {
    use base64::prelude::*;

    use super::*;
    use crate::key::tests::{rsa_key, verify_with_jwk};

    fn decode_header(jws: &FlattenedJsonJws) -> serde_json::Value {
        let raw = BASE64_URL_SAFE_NO_PAD.decode(jws.protected()).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn jwk_binding_embeds_key() {
        let key = AccountKey::generate_p256();
        let header = JwsProtectedHeader::new(
            &key,
            KeyBinding::Jwk,
            "https://ca.test/acct",
            Some("n0nce".to_owned()),
        );
        let jws = jws_with(&header, &key, br#"{"termsOfServiceAgreed":true}"#).unwrap();

        let header = decode_header(&jws);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["nonce"], "n0nce");
        assert_eq!(header["url"], "https://ca.test/acct");
        assert_eq!(header["jwk"]["kty"], "EC");
        assert_eq!(header["jwk"]["crv"], "P-256");
        assert!(header.get("kid").is_none());
    }

    #[test]
    fn kid_binding_references_account() {
        let key = rsa_key();
        let header = JwsProtectedHeader::new(
            &key,
            KeyBinding::Kid("https://ca.test/acct/1"),
            "https://ca.test/order",
            Some("n0nce".to_owned()),
        );
        let jws = jws_with(&header, &key, b"{}").unwrap();

        let header = decode_header(&jws);
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "https://ca.test/acct/1");
        assert!(header.get("jwk").is_none());
    }

    #[test]
    fn header_without_nonce_omits_field() {
        let key = AccountKey::generate_p384();
        let header = JwsProtectedHeader::new(&key, KeyBinding::Jwk, "https://ca.test/kc", None);
        let jws = jws_with(&header, &key, b"{}").unwrap();

        assert!(decode_header(&jws).get("nonce").is_none());
    }

    #[test]
    fn post_as_get_payload_is_empty_string() {
        let key = AccountKey::generate_p256();
        let header = JwsProtectedHeader::new(
            &key,
            KeyBinding::Kid("https://ca.test/acct/1"),
            "https://ca.test/order/1",
            Some("n".to_owned()),
        );
        let jws = jws_with(&header, &key, b"").unwrap();

        let wire = serde_json::to_value(&jws).unwrap();
        assert_eq!(wire["payload"], "");
        assert_eq!(wire.as_object().unwrap().len(), 3);
    }

    #[test]
    fn signature_covers_header_and_payload() {
        for key in [AccountKey::generate_p256(), AccountKey::generate_p384(), rsa_key()] {
            let header = JwsProtectedHeader::new(
                &key,
                KeyBinding::Jwk,
                "https://ca.test/acct",
                Some("n".to_owned()),
            );
            let jws = jws_with(&header, &key, br#"{"a":1}"#).unwrap();

            let signing_input = format!("{}.{}", jws.protected(), jws.payload());
            let signature = BASE64_URL_SAFE_NO_PAD.decode(jws.signature()).unwrap();

            assert!(verify_with_jwk(
                key.public_jwk(),
                key.algorithm().as_str(),
                signing_input.as_bytes(),
                &signature
            ));
        }
    }

    #[test]
    fn thumbprint_matches_rfc_7638_example() {
        // https://datatracker.ietf.org/doc/html/rfc7638#section-3.1
        let jwk = Jwk::Rsa {
            e: "AQAB".to_owned(),
            n: "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw".to_owned(),
        };

        assert_eq!(
            jwk.thumbprint().unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }
}
