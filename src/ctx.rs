use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    api,
    dir::{DirectoryResolver, DirectoryUrl},
    error::*,
    jws::FlattenedJsonJws,
    key::AccountKey,
    nonce::NonceStore,
    req::{HttpClient, ReqwestClient},
    trans::Signer,
};

/// The account key currently in use, tagged with how many key changes preceded it.
#[derive(Debug)]
pub(crate) struct ActiveKey {
    pub(crate) key: AccountKey,
    pub(crate) generation: u64,
}

#[derive(Debug)]
pub(crate) struct ContextInner {
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) directory: DirectoryResolver,
    pub(crate) nonces: NonceStore,
    pub(crate) active_key: RwLock<ActiveKey>,
    account_url: RwLock<Option<String>>,

    /// Serializes key changes; held across the whole key change round trip.
    pub(crate) rotation: tokio::sync::Mutex<()>,
}

impl ContextInner {
    pub(crate) fn key_generation(&self) -> u64 {
        self.active_key.read().generation
    }

    pub(crate) fn account_url(&self) -> Option<String> {
        self.account_url.read().clone()
    }

    pub(crate) fn require_account_url(&self) -> Result<String> {
        self.account_url().ok_or_else(|| {
            Error::InvalidState("no account; call get_or_create or load_existing first".to_owned())
        })
    }

    pub(crate) fn set_account_url(&self, url: String) {
        *self.account_url.write() = Some(url);
    }

    /// Swaps in `key` as the active account key and returns the new generation.
    pub(crate) fn replace_key(&self, key: AccountKey) -> u64 {
        let mut active = self.active_key.write();
        active.key = key;
        active.generation += 1;
        active.generation
    }
}

/// Entry point for talking to an ACME authority.
///
/// A context owns exactly one account key and one nonce store. All handles derived from it
/// ([`Account`], [`Order`], ...) share both, so a context can be cloned and used from many tasks
/// at once. Independent contexts never share nonces.
///
/// Typical flow:
///
/// 1. [`AcmeContext::new()`] with the directory URL and an [`AccountKey`];
/// 2. [`get_or_create`] to register or look up the account;
/// 3. [`new_order`] for each certificate, then drive the returned [`Order`].
///
/// [`Account`]: crate::Account
/// [`Order`]: crate::order::Order
/// [`get_or_create`]: AcmeContext::get_or_create()
/// [`new_order`]: AcmeContext::new_order()
#[derive(Debug, Clone)]
pub struct AcmeContext {
    pub(crate) inner: Arc<ContextInner>,
}

impl AcmeContext {
    /// Creates a context that talks to `url` through a default [`ReqwestClient`].
    ///
    /// Nothing is fetched until the first operation.
    pub fn new(url: DirectoryUrl<'_>, key: AccountKey) -> Result<Self> {
        let http = ReqwestClient::new()?;
        Ok(Self::with_http_client(url, key, Arc::new(http)))
    }

    /// Creates a context using a caller supplied transport.
    pub fn with_http_client(
        url: DirectoryUrl<'_>,
        key: AccountKey,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let inner = ContextInner {
            http,
            directory: DirectoryResolver::new(url),
            nonces: NonceStore::new(),
            active_key: RwLock::new(ActiveKey { key, generation: 0 }),
            account_url: RwLock::new(None),
            rotation: tokio::sync::Mutex::new(()),
        };

        AcmeContext {
            inner: Arc::new(inner),
        }
    }

    /// URL of the directory this context talks to.
    pub fn directory_url(&self) -> &str {
        self.inner.directory.url()
    }

    /// Returns the directory, fetching it on first use.
    pub async fn directory(&self) -> Result<Arc<api::Directory>> {
        self.inner.directory.resolve(&*self.inner.http).await
    }

    /// Fetches the directory again, replacing the cached copy.
    pub async fn refresh_directory(&self) -> Result<Arc<api::Directory>> {
        self.inner.directory.refresh(&*self.inner.http).await
    }

    /// The active account key.
    ///
    /// Changes after a successful [`change_key`](AcmeContext::change_key).
    pub fn account_key(&self) -> AccountKey {
        self.inner.active_key.read().key.clone()
    }

    /// Resource URL of the account, once known.
    pub fn account_url(&self) -> Option<String> {
        self.inner.account_url()
    }

    /// Signs `entity` for `url` with the account key, referencing the account by `kid`.
    ///
    /// Consumes one nonce. The returned envelope is not sent anywhere.
    pub async fn sign<T: Serialize + ?Sized>(
        &self,
        entity: &T,
        url: &str,
    ) -> Result<FlattenedJsonJws> {
        let payload = serde_json::to_vec(entity)?;
        self.inner
            .sign(url, &payload, Signer::Account { generation: None })
            .await
    }
}
