use std::sync::Arc;

use sha2::{Digest as _, Sha256};

use crate::{
    api,
    ctx::ContextInner,
    error::*,
    trans::{check_generation, Signer},
    util::{base64url, read_json},
};

const HTTP_01: &str = "http-01";
const DNS_01: &str = "dns-01";
const TLS_ALPN_01: &str = "tls-alpn-01";

/// An authorization ([ownership proof]) for one identifier of an order.
///
/// Each authorization for an order must be progressed to a valid state before the ACME API
/// will issue a certificate.
///
/// Authorizations may or may not be required depending on previous orders against the same
/// ACME account. The ACME API decides if the authorization is needed.
///
/// Provisioning the proof (web server, DNS record, TLS certificate) is up to the caller; this
/// type only tracks state and computes the values to provision.
///
/// [ownership proof]: https://datatracker.ietf.org/doc/html/rfc8555#section-8
#[derive(Debug)]
pub struct Authorization {
    ctx: Arc<ContextInner>,
    generation: u64,
    url: String,
    api_auth: api::Authorization,
}

impl Authorization {
    pub(crate) fn new(
        ctx: &Arc<ContextInner>,
        generation: u64,
        url: String,
        api_auth: api::Authorization,
    ) -> Self {
        Authorization {
            ctx: Arc::clone(ctx),
            generation,
            url,
            api_auth,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The identifier being authorized.
    pub fn identifier(&self) -> &api::Identifier {
        &self.api_auth.identifier
    }

    pub fn status(&self) -> api::AuthorizationStatus {
        self.api_auth.status
    }

    /// Whether we actually need to do the authorization. This might not be needed if we have
    /// proven ownership of the identifier recently in a previous order.
    pub fn need_challenge(&self) -> bool {
        !matches!(self.api_auth.status, api::AuthorizationStatus::Valid)
    }

    /// Returns the challenge of type `kind`, e.g. `http-01`.
    pub fn challenge(&self, kind: &str) -> Option<Challenge> {
        self.api_auth
            .challenge(kind)
            .map(|c| Challenge::new(&self.ctx, self.generation, c.clone()))
    }

    /// The `http-01` challenge, see [RFC 8555 §8.3].
    ///
    /// The proof ([`Challenge::key_authorization()`]) must be served over plain HTTP at:
    ///
    /// ```text
    /// http://<domain-to-be-proven>/.well-known/acme-challenge/<token>
    /// ```
    ///
    /// [RFC 8555 §8.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.3
    pub fn http_challenge(&self) -> Option<Challenge> {
        self.challenge(HTTP_01)
    }

    /// The `dns-01` challenge, see [RFC 8555 §8.4].
    ///
    /// The proof ([`Challenge::dns_txt_value()`]) goes into a `TXT` record:
    ///
    /// ```text
    /// _acme-challenge.<domain-to-be-proven>.  TXT  <proof>
    /// ```
    ///
    /// [RFC 8555 §8.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.4
    pub fn dns_challenge(&self) -> Option<Challenge> {
        self.challenge(DNS_01)
    }

    /// The `tls-alpn-01` challenge, see [RFC 8737 §3].
    ///
    /// The proof ([`Challenge::tls_alpn_digest()`]) goes into the `acmeIdentifier` extension of
    /// the certificate served for the `acme-tls/1` ALPN protocol.
    ///
    /// [RFC 8737 §3]: https://datatracker.ietf.org/doc/html/rfc8737#section-3
    pub fn tls_alpn_challenge(&self) -> Option<Challenge> {
        self.challenge(TLS_ALPN_01)
    }

    /// Fetches the authorization's current state.
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self.ctx.post_as_get(&self.url, Some(self.generation)).await?;
        self.api_auth = read_json(&res)?;
        Ok(())
    }

    /// Gives up the authorization, e.g. for an identifier no longer controlled.
    pub async fn deactivate(&mut self) -> Result<()> {
        let payload = serde_json::to_vec(&api::Deactivation)?;
        let signer = Signer::Account {
            generation: Some(self.generation),
        };

        let res = self.ctx.call(&self.url, &payload, signer).await?;
        self.api_auth = read_json(&res)?;
        Ok(())
    }

    /// Returns a reference to the authorization's API object.
    ///
    /// Useful for debugging.
    pub fn api_authorization(&self) -> &api::Authorization {
        &self.api_auth
    }
}

/// A challenge offered by an [`Authorization`].
#[derive(Debug, Clone)]
pub struct Challenge {
    ctx: Arc<ContextInner>,
    generation: u64,
    api_challenge: api::Challenge,
}

impl Challenge {
    fn new(ctx: &Arc<ContextInner>, generation: u64, api_challenge: api::Challenge) -> Self {
        Challenge {
            ctx: Arc::clone(ctx),
            generation,
            api_challenge,
        }
    }

    /// Challenge type, e.g. `dns-01`.
    pub fn kind(&self) -> &str {
        &self.api_challenge._type
    }

    pub fn url(&self) -> &str {
        &self.api_challenge.url
    }

    /// Returns the token, a unique identifier of the challenge.
    ///
    /// For `http-01` this is the file name under `/.well-known/acme-challenge/`.
    pub fn token(&self) -> &str {
        &self.api_challenge.token
    }

    pub fn status(&self) -> api::ChallengeStatus {
        self.api_challenge.status
    }

    /// Returns true if this challenge needs validation.
    ///
    /// It might already been done in a previous order for the same account.
    pub fn need_validate(&self) -> bool {
        self.api_challenge.is_pending()
    }

    /// `<token>.<thumbprint of the account key>`.
    ///
    /// This is the `http-01` proof as-is and the input to the other proofs.
    pub fn key_authorization(&self) -> Result<String> {
        let thumbprint = {
            let active = self.ctx.active_key.read();
            check_generation(Some(self.generation), active.generation)?;
            active.key.thumbprint()?
        };

        Ok(format!("{}.{thumbprint}", self.api_challenge.token))
    }

    /// Value of the `_acme-challenge` TXT record for `dns-01`.
    pub fn dns_txt_value(&self) -> Result<String> {
        let key_auth = self.key_authorization()?;
        Ok(base64url(&Sha256::digest(key_auth)))
    }

    /// SHA-256 of the key authorization, for the `tls-alpn-01` certificate extension.
    pub fn tls_alpn_digest(&self) -> Result<[u8; 32]> {
        let key_auth = self.key_authorization()?;
        Ok(Sha256::digest(key_auth).into())
    }

    /// Tells the ACME API to attempt to validate the proof of this challenge.
    ///
    /// The proof must be in place before this call. Validation happens asynchronously on the
    /// authority's side; poll the [`Authorization`] or the order to learn the outcome.
    pub async fn validate(&mut self) -> Result<()> {
        let payload = serde_json::to_vec(&api::EmptyObject)?;
        let signer = Signer::Account {
            generation: Some(self.generation),
        };

        let res = self.ctx.call(&self.api_challenge.url, &payload, signer).await?;
        self.api_challenge = read_json(&res)?;
        Ok(())
    }

    /// Fetches the challenge's current state.
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self
            .ctx
            .post_as_get(&self.api_challenge.url, Some(self.generation))
            .await?;
        self.api_challenge = read_json(&res)?;
        Ok(())
    }

    /// Returns a reference to the challenge's API object.
    ///
    /// Useful for debugging.
    pub fn api_challenge(&self) -> &api::Challenge {
        &self.api_challenge
    }
}
