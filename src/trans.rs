//! JWS payload and nonce handling for requests to the API.

use crate::{
    ctx::ContextInner,
    dir::Operation,
    error::*,
    jws::{jws_with, FlattenedJsonJws, JwsProtectedHeader, KeyBinding},
    key::AccountKey,
    req::{req_handle_error, HttpRequest, HttpResponse},
};

/// Which key signs a request and how the signer is identified to the authority.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Signer<'a> {
    /// The active account key, identified by `kid`.
    ///
    /// With `Some(generation)` the request fails with [`Error::StaleKey`] unless the active key
    /// is still the one from that generation.
    Account { generation: Option<u64> },

    /// The active account key, embedded as `jwk`. Only for `newAccount`.
    ///
    /// Fails with [`Error::StaleKey`] unless the active key is still the one from `generation`.
    AccountJwk { generation: u64 },

    /// Some other key, embedded as `jwk`. Used for revocation by certificate key.
    Key(&'a AccountKey),
}

impl ContextInner {
    /// Signs `payload` for `url`, consuming one nonce.
    pub(crate) async fn sign(
        &self,
        url: &str,
        payload: &[u8],
        signer: Signer<'_>,
    ) -> Result<FlattenedJsonJws> {
        self.check_signer(signer)?;

        let nonce = self.next_nonce().await?;
        self.jws(url, payload, signer, nonce)
    }

    /// Make a signed call, turning any non-2xx response into an error.
    pub(crate) async fn call(
        &self,
        url: &str,
        payload: &[u8],
        signer: Signer<'_>,
    ) -> Result<HttpResponse> {
        let res = self.call_raw(url, payload, signer).await?;
        req_handle_error(res)
    }

    /// POST-as-GET: a signed request with an empty payload.
    pub(crate) async fn post_as_get(
        &self,
        url: &str,
        generation: Option<u64>,
    ) -> Result<HttpResponse> {
        self.call(url, b"", Signer::Account { generation }).await
    }

    /// Make a signed call.
    ///
    /// A `badNonce` rejection is retried exactly once with a new nonce; a second one is returned
    /// as [`Error::Protocol`]. Every other response, including errors, is returned untouched.
    pub(crate) async fn call_raw(
        &self,
        url: &str,
        payload: &[u8],
        signer: Signer<'_>,
    ) -> Result<HttpResponse> {
        // fail before a nonce is spent
        self.check_signer(signer)?;

        let mut retried = false;

        loop {
            // Either get a new nonce, or reuse one from a previous response.
            let nonce = self.next_nonce().await?;

            let jws = self.jws(url, payload, signer, nonce)?;
            let body = serde_json::to_string(&jws)?;

            log::debug!("Call endpoint: {url}");

            let res = self.http.request(HttpRequest::post(url, body)).await?;

            // Regardless of the request being a success or not, there might be a nonce in the
            // response.
            self.nonces.extract_nonce(&res);

            if res.status.is_success() {
                return Ok(res);
            }

            match req_handle_error(res.clone()) {
                Err(Error::BadNonce(_)) if !retried => {
                    log::debug!("Retrying on bad nonce");
                    retried = true;
                }

                Err(Error::BadNonce(problem)) => return Err(Error::Protocol(problem)),

                _ => return Ok(res),
            }
        }
    }

    async fn next_nonce(&self) -> Result<String> {
        let new_nonce = self
            .directory
            .endpoint(&*self.http, Operation::NewNonce)
            .await?;

        self.nonces.get(&*self.http, &new_nonce).await
    }

    fn check_signer(&self, signer: Signer<'_>) -> Result<()> {
        match signer {
            Signer::Account { generation } => {
                check_generation(generation, self.key_generation())?;
                self.require_account_url()?;
            }

            Signer::AccountJwk { generation } => {
                check_generation(Some(generation), self.key_generation())?;
            }

            Signer::Key(_) => {}
        }

        Ok(())
    }

    fn jws(
        &self,
        url: &str,
        payload: &[u8],
        signer: Signer<'_>,
        nonce: String,
    ) -> Result<FlattenedJsonJws> {
        match signer {
            Signer::Key(key) => {
                let protected = JwsProtectedHeader::new(key, KeyBinding::Jwk, url, Some(nonce));
                jws_with(&protected, key, payload)
            }

            Signer::AccountJwk { generation } => {
                let active = self.active_key.read();
                check_generation(Some(generation), active.generation)?;

                let protected =
                    JwsProtectedHeader::new(&active.key, KeyBinding::Jwk, url, Some(nonce));
                jws_with(&protected, &active.key, payload)
            }

            Signer::Account { generation } => {
                // held while signing so a key change cannot swap the key mid-way
                let active = self.active_key.read();
                check_generation(generation, active.generation)?;

                let kid = self.require_account_url()?;
                let protected = JwsProtectedHeader::new(
                    &active.key,
                    KeyBinding::Kid(&kid),
                    url,
                    Some(nonce),
                );
                jws_with(&protected, &active.key, payload)
            }
        }
    }
}

pub(crate) fn check_generation(pinned: Option<u64>, active: u64) -> Result<()> {
    match pinned {
        Some(generation) if generation != active => Err(Error::StaleKey),
        _ => Ok(()),
    }
}
