use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    api,
    error::*,
    req::{req_handle_error, HttpClient, HttpRequest},
    util::read_json,
};

const LETSENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Enumeration of known ACME API directories.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt directory.
    ///
    /// Not appropriate for testing / development.
    LetsEncrypt,

    /// The staging Let's Encrypt directory.
    ///
    /// Use for testing and development. Doesn't issue "valid" certificates. The root signing
    /// certificate is not supposed to be in any trust chains.
    LetsEncryptStaging,

    /// Provide an arbitrary director URL to connect to.
    Other(&'a str),
}

impl<'a> DirectoryUrl<'a> {
    fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT_URL,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING_URL,
            DirectoryUrl::Other(url) => url,
        }
    }
}

/// Protocol operations advertised by a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    NewNonce,
    NewAccount,
    NewOrder,
    NewAuthz,
    RevokeCert,
    KeyChange,
}

impl Operation {
    /// Field name used in the directory document.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::NewNonce => "newNonce",
            Operation::NewAccount => "newAccount",
            Operation::NewOrder => "newOrder",
            Operation::NewAuthz => "newAuthz",
            Operation::RevokeCert => "revokeCert",
            Operation::KeyChange => "keyChange",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetches the directory document once and hands out the cached copy afterwards.
///
/// A cached directory is never mutated; [`refresh`](Self::refresh) swaps in a new snapshot.
#[derive(Debug)]
pub(crate) struct DirectoryResolver {
    url: String,
    cached: RwLock<Option<Arc<api::Directory>>>,
}

impl DirectoryResolver {
    pub(crate) fn new(url: DirectoryUrl<'_>) -> Self {
        DirectoryResolver {
            url: url.to_url().to_owned(),
            cached: RwLock::new(None),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Returns the cached directory, fetching it on first use.
    ///
    /// Failures are not cached.
    pub(crate) async fn resolve(&self, http: &dyn HttpClient) -> Result<Arc<api::Directory>> {
        let cached = self.cached.read().clone();

        if let Some(dir) = cached {
            return Ok(dir);
        }

        self.refresh(http).await
    }

    /// Fetches the directory and replaces the cached snapshot.
    pub(crate) async fn refresh(&self, http: &dyn HttpClient) -> Result<Arc<api::Directory>> {
        log::debug!("Fetch directory: {}", self.url);

        let res = req_handle_error(http.request(HttpRequest::get(&self.url)).await?)?;
        let dir = Arc::new(read_json::<api::Directory>(&res)?);

        *self.cached.write() = Some(Arc::clone(&dir));

        Ok(dir)
    }

    /// URL of the endpoint for `op`.
    pub(crate) async fn endpoint(&self, http: &dyn HttpClient, op: Operation) -> Result<String> {
        let dir = self.resolve(http).await?;

        dir.endpoint(op)
            .map(ToOwned::to_owned)
            .ok_or(Error::UnknownOperation(op))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test::{MockHttp, MockResponse};

    const DIR: &str = r#"{
        "newAccount": "https://ca.test/acct",
        "newOrder": "https://ca.test/order",
        "newNonce": "https://ca.test/nonce"
    }"#;

    #[tokio::test]
    async fn resolves_once() {
        let http = MockHttp::new(|_req| MockResponse::json(200, DIR));
        let resolver = DirectoryResolver::new(DirectoryUrl::Other("https://ca.test/dir"));

        let first = resolver.resolve(&http).await.unwrap();
        let second = resolver.resolve(&http).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(http.requests().len(), 1);
        assert_eq!(http.requests()[0].url, "https://ca.test/dir");
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot() {
        let http = MockHttp::new(|_req| MockResponse::json(200, DIR));
        let resolver = DirectoryResolver::new(DirectoryUrl::Other("https://ca.test/dir"));

        let first = resolver.resolve(&http).await.unwrap();
        let second = resolver.refresh(&http).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        assert_eq!(http.requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_endpoint_is_unknown_operation() {
        let http = MockHttp::new(|_req| MockResponse::json(200, DIR));
        let resolver = DirectoryResolver::new(DirectoryUrl::Other("https://ca.test/dir"));

        assert_eq!(
            resolver.endpoint(&http, Operation::NewOrder).await.unwrap(),
            "https://ca.test/order"
        );

        let err = resolver
            .endpoint(&http, Operation::KeyChange)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownOperation(Operation::KeyChange)));
    }

    #[tokio::test]
    async fn fetch_failure_is_not_cached() {
        let calls = AtomicUsize::new(0);
        let http = MockHttp::new(move |_req| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                MockResponse::problem(503, "urn:ietf:params:acme:error:serverInternal", "down")
            } else {
                MockResponse::json(200, DIR)
            }
        });
        let resolver = DirectoryResolver::new(DirectoryUrl::Other("https://ca.test/dir"));

        assert!(matches!(
            resolver.resolve(&http).await,
            Err(Error::Protocol(_))
        ));
        assert!(resolver.resolve(&http).await.is_ok());
    }

    #[tokio::test]
    async fn fetch_against_test_server() {
        let server = crate::test::with_directory_server();
        let http = crate::ReqwestClient::new().unwrap();
        let resolver = DirectoryResolver::new(DirectoryUrl::Other(&server.dir_url));

        let dir = resolver.resolve(&http).await.unwrap();
        assert!(dir.endpoint(Operation::KeyChange).is_some());
        assert!(dir.endpoint(Operation::NewAuthz).is_none());
    }
}
