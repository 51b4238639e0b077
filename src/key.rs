//! Asymmetric keys used to sign ACME requests.

use std::fmt;

use ecdsa::signature::Signer as _;
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _, LineEnding};
use rsa::{
    signature::{SignatureEncoding as _, Signer as _},
    traits::PublicKeyParts as _,
    RsaPrivateKey,
};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{error::*, jws::Jwk, util::base64url};

/// Smallest RSA modulus accepted for signing.
pub const MIN_RSA_BITS: usize = 2048;

/// JWS signature algorithms implied by the supported key types.
///
/// See [RFC 7518 §3.1].
///
/// [RFC 7518 §3.1]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    RS256,
    /// ECDSA using P-256 and SHA-256.
    ES256,
    /// ECDSA using P-384 and SHA-384.
    ES384,
}

impl SignatureAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::RS256 => "RS256",
            SignatureAlgorithm::ES256 => "ES256",
            SignatureAlgorithm::ES384 => "ES384",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
enum KeyKind {
    Rsa(Box<RsaPrivateKey>),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

/// A private key able to sign JWS payloads.
///
/// Supported are RSA keys of at least 2048 bits and elliptic curve keys on P-256 or P-384. The
/// signing algorithm follows from the key type and is never chosen by the caller.
///
/// The public [`Jwk`] is derived once at construction.
#[derive(Clone)]
pub struct AccountKey {
    kind: KeyKind,
    jwk: Jwk,
}

impl AccountKey {
    /// Generates a fresh P-256 key.
    pub fn generate_p256() -> AccountKey {
        Self::from_p256(crate::create_p256_key())
    }

    /// Generates a fresh P-384 key.
    pub fn generate_p384() -> AccountKey {
        let csprng = &mut rand::thread_rng();
        Self::from_p384(ecdsa::SigningKey::from(p384::SecretKey::random(csprng)))
    }

    /// Generates a fresh RSA key with a modulus of `bits` bits.
    pub fn generate_rsa(bits: usize) -> Result<AccountKey> {
        if bits < MIN_RSA_BITS {
            return Err(Error::UnsupportedKey(format!(
                "RSA key of {bits} bits, at least {MIN_RSA_BITS} required"
            )));
        }

        let csprng = &mut rand::thread_rng();
        let key = RsaPrivateKey::new(csprng, bits).map_err(|err| Error::Key(err.to_string()))?;
        Self::from_rsa(key)
    }

    pub fn from_p256(signing_key: p256::ecdsa::SigningKey) -> AccountKey {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let jwk = Jwk::ec(
            "P-256",
            point.x().map(|x| x.as_slice()).unwrap_or_default(),
            point.y().map(|y| y.as_slice()).unwrap_or_default(),
        );

        AccountKey {
            kind: KeyKind::P256(signing_key),
            jwk,
        }
    }

    pub fn from_p384(signing_key: p384::ecdsa::SigningKey) -> AccountKey {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let jwk = Jwk::ec(
            "P-384",
            point.x().map(|x| x.as_slice()).unwrap_or_default(),
            point.y().map(|y| y.as_slice()).unwrap_or_default(),
        );

        AccountKey {
            kind: KeyKind::P384(signing_key),
            jwk,
        }
    }

    /// Wraps an RSA key, rejecting moduli below [`MIN_RSA_BITS`].
    pub fn from_rsa(key: RsaPrivateKey) -> Result<AccountKey> {
        let bits = key.size() * 8;
        if bits < MIN_RSA_BITS {
            return Err(Error::UnsupportedKey(format!(
                "RSA key of {bits} bits, at least {MIN_RSA_BITS} required"
            )));
        }

        let jwk = Jwk::Rsa {
            e: base64url(&key.e().to_bytes_be()),
            n: base64url(&key.n().to_bytes_be()),
        };

        Ok(AccountKey {
            kind: KeyKind::Rsa(Box::new(key)),
            jwk,
        })
    }

    /// Reads a PKCS#8 PEM encoded private key of any supported type.
    pub fn from_pkcs8_pem(pem: &str) -> Result<AccountKey> {
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self::from_p256(key));
        }

        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self::from_p384(key));
        }

        match RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(key) => Self::from_rsa(key),
            Err(err) => Err(Error::UnsupportedKey(format!(
                "not a P-256, P-384 or RSA PKCS#8 key: {err}"
            ))),
        }
    }

    /// Private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        let pem = match &self.kind {
            KeyKind::Rsa(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyKind::P256(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyKind::P384(key) => key.to_pkcs8_pem(LineEnding::LF),
        };

        pem.map_err(|err| Error::Key(err.to_string()))
    }

    /// The JWS algorithm identifier for this key.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self.kind {
            KeyKind::Rsa(_) => SignatureAlgorithm::RS256,
            KeyKind::P256(_) => SignatureAlgorithm::ES256,
            KeyKind::P384(_) => SignatureAlgorithm::ES384,
        }
    }

    /// Public half of the key as a JSON Web Key.
    pub fn public_jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// Signs `data` with the algorithm returned by [`algorithm`](Self::algorithm).
    ///
    /// RSA signatures are PKCS#1 v1.5. ECDSA signatures are the fixed size `r || s` concatenation
    /// required by [RFC 7518 §3.4], not DER.
    ///
    /// [RFC 7518 §3.4]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.4
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match &self.kind {
            KeyKind::Rsa(key) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.as_ref().clone());
                signing_key
                    .try_sign(data)
                    .map(|sig| sig.to_vec())
                    .map_err(|err| Error::Signing(err.to_string()))?
            }

            KeyKind::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .try_sign(data)
                    .map_err(|err| Error::Signing(err.to_string()))?;
                sig.to_bytes().to_vec()
            }

            KeyKind::P384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .try_sign(data)
                    .map_err(|err| Error::Signing(err.to_string()))?;
                sig.to_bytes().to_vec()
            }
        };

        Ok(signature)
    }

    /// JWK thumbprint as defined in [RFC 7638], base64url encoded.
    ///
    /// [RFC 7638]: https://datatracker.ietf.org/doc/html/rfc7638
    pub fn thumbprint(&self) -> Result<String> {
        self.jwk.thumbprint()
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("alg", &self.algorithm())
            .field("jwk", &self.jwk)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::OnceLock;

    use base64::prelude::*;
    use ecdsa::signature::Verifier as _;
    use rsa::{BigUint, RsaPublicKey};

    use super::*;

    /// One RSA key for the whole test run; generating them is slow.
    pub(crate) fn rsa_key() -> AccountKey {
        static KEY: OnceLock<AccountKey> = OnceLock::new();
        KEY.get_or_init(|| AccountKey::generate_rsa(2048).unwrap())
            .clone()
    }

    fn b64(s: &str) -> Vec<u8> {
        BASE64_URL_SAFE_NO_PAD.decode(s).unwrap()
    }

    /// Verifies `signature` over `data` using nothing but the public JWK.
    pub(crate) fn verify_with_jwk(jwk: &Jwk, alg: &str, data: &[u8], signature: &[u8]) -> bool {
        match (jwk, alg) {
            (Jwk::Ec { crv, x, y }, "ES256") if crv == "P-256" => {
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(&b64(x)),
                    p256::FieldBytes::from_slice(&b64(y)),
                    false,
                );
                let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point).unwrap();
                let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(data, &sig).is_ok()
            }

            (Jwk::Ec { crv, x, y }, "ES384") if crv == "P-384" => {
                let point = p384::EncodedPoint::from_affine_coordinates(
                    p384::FieldBytes::from_slice(&b64(x)),
                    p384::FieldBytes::from_slice(&b64(y)),
                    false,
                );
                let key = p384::ecdsa::VerifyingKey::from_encoded_point(&point).unwrap();
                let Ok(sig) = p384::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(data, &sig).is_ok()
            }

            (Jwk::Rsa { e, n }, "RS256") => {
                let public = RsaPublicKey::new(
                    BigUint::from_bytes_be(&b64(n)),
                    BigUint::from_bytes_be(&b64(e)),
                )
                .unwrap();
                let key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public);
                let Ok(sig) = rsa::pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                rsa::signature::Verifier::verify(&key, data, &sig).is_ok()
            }

            _ => false,
        }
    }

    #[test]
    fn algorithm_follows_key_type() {
        assert_eq!(AccountKey::generate_p256().algorithm(), SignatureAlgorithm::ES256);
        assert_eq!(AccountKey::generate_p384().algorithm(), SignatureAlgorithm::ES384);
        assert_eq!(rsa_key().algorithm(), SignatureAlgorithm::RS256);
    }

    #[test]
    fn sign_verifies_with_public_jwk() {
        let data = b"eyJhbGciOiJFUzI1NiJ9.eyJmb28iOiJiYXIifQ";

        for key in [AccountKey::generate_p256(), AccountKey::generate_p384(), rsa_key()] {
            let alg = key.algorithm();
            let sig = key.sign(data).unwrap();

            assert!(verify_with_jwk(key.public_jwk(), alg.as_str(), data, &sig), "{alg}");
            assert!(!verify_with_jwk(key.public_jwk(), alg.as_str(), b"tampered", &sig), "{alg}");
        }
    }

    #[test]
    fn ecdsa_signatures_are_raw_r_s() {
        let p256 = AccountKey::generate_p256().sign(b"data").unwrap();
        assert_eq!(p256.len(), 64);

        let p384 = AccountKey::generate_p384().sign(b"data").unwrap();
        assert_eq!(p384.len(), 96);
    }

    #[test]
    fn rejects_small_rsa_keys() {
        assert!(matches!(
            AccountKey::generate_rsa(1024),
            Err(Error::UnsupportedKey(_))
        ));

        let small = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        assert!(matches!(
            AccountKey::from_rsa(small),
            Err(Error::UnsupportedKey(_))
        ));
    }

    #[test]
    fn pem_round_trip_keeps_key_type() {
        for key in [AccountKey::generate_p256(), AccountKey::generate_p384()] {
            let pem = key.to_pkcs8_pem().unwrap();
            let loaded = AccountKey::from_pkcs8_pem(&pem).unwrap();

            assert_eq!(loaded.algorithm(), key.algorithm());
            assert_eq!(loaded.public_jwk(), key.public_jwk());
        }

        assert!(matches!(
            AccountKey::from_pkcs8_pem("not a key"),
            Err(Error::UnsupportedKey(_))
        ));
    }
}
