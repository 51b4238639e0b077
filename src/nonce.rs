use parking_lot::Mutex;

use crate::{
    error::*,
    req::{req_expect_header, req_handle_error, HttpClient, HttpRequest, HttpResponse},
};

const REPLAY_NONCE: &str = "replay-nonce";

/// Cache of the most recent unused replay nonce.
///
/// A nonce is removed from the store the moment it is handed out, so two signers can never
/// observe the same value. Every response from the authority carries a fresh nonce which
/// replaces whatever is cached.
#[derive(Debug, Default)]
pub(crate) struct NonceStore {
    nonce: Mutex<Option<String>>,
}

impl NonceStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes the cached nonce or, if there is none, fetches one from `new_nonce_url`.
    ///
    /// The lock is only held to take the cached value; a fetched nonce goes straight to the
    /// caller without passing through the cache.
    pub(crate) async fn get(&self, http: &dyn HttpClient, new_nonce_url: &str) -> Result<String> {
        let cached = self.nonce.lock().take();

        if let Some(nonce) = cached {
            log::trace!("Use previous nonce");
            return Ok(nonce);
        }

        log::debug!("Request new nonce");
        let res = http.request(HttpRequest::head(new_nonce_url)).await?;
        let res = req_handle_error(res)?;

        // TODO: ignore invalid replay-nonce values
        // see https://datatracker.ietf.org/doc/html/rfc8555#section-6.5.1
        req_expect_header(&res, REPLAY_NONCE)
    }

    /// Replaces the cached nonce.
    pub(crate) fn put(&self, nonce: String) {
        *self.nonce.lock() = Some(nonce);
    }

    /// Caches the nonce carried by `res`, if any.
    ///
    /// Called for every response to a signed request, successful or not.
    pub(crate) fn extract_nonce(&self, res: &HttpResponse) {
        if let Some(nonce) = res.header(REPLAY_NONCE) {
            log::trace!("Extracting new nonce");
            self.put(nonce.to_owned());
        }
    }
}
