//! Order life cycle.
//!
//! An order moves through the states below. Every transition is decided by the authority; the
//! client only polls and submits the CSR.
//!
//! ```text
//! pending -> ready -> processing -> valid
//!    \         \          \
//!     `---------`----------`------> invalid
//! ```
//!
//! 1. First prove ownership of each identifier:
//!    * [`Order::authorizations()`] -> [`Authorization`]* -> [`Challenge`]
//! 2. Then submit the CSR and download the certificate:
//!    * [`Order::finalize()`] -> [`Order::wait_for_certificate()`] ->
//!      [`Order::download_certificate()`]
//!
//! \* One per identifier.

use std::{collections::HashSet, sync::Arc, time::Duration};

use der::Encode as _;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::{
    api::{self, OrderStatus},
    cert::create_csr,
    ctx::ContextInner,
    dir::Operation,
    error::*,
    req::{req_expect_header, retry_after, HttpResponse},
    trans::Signer,
    util::read_json,
    AcmeContext,
};

mod auth;

pub use self::auth::{Authorization, Challenge};

impl AcmeContext {
    /// Create a new order to issue a certificate for `names`.
    ///
    /// Names that parse as IP addresses become `ip` identifiers, everything else `dns`.
    /// Duplicates are dropped, keeping the first occurrence; the first name becomes the CSR's
    /// Common Name in [`Order::finalize_with_key()`].
    ///
    /// This library doesn't constrain the number of names, but it is limited by the ACME API
    /// provider. Let's Encrypt [sets a max of 100 names] per certificate.
    ///
    /// Every call creates a new order with the ACME API provider, even when the names supplied
    /// are exactly the same.
    ///
    /// [sets a max of 100 names]: https://letsencrypt.org/docs/rate-limits/
    pub async fn new_order(
        &self,
        names: &[&str],
        not_before: Option<OffsetDateTime>,
        not_after: Option<OffsetDateTime>,
    ) -> Result<Order> {
        let mut identifiers = Vec::new();
        let mut dedup = HashSet::new();
        for &name in names {
            if dedup.insert(name) {
                identifiers.push(api::Identifier::from_name(name));
            }
        }

        if identifiers.is_empty() {
            return Err(Error::InvalidArgument(
                "an order needs at least one identifier".to_owned(),
            ));
        }

        let inner = &self.inner;
        let generation = inner.key_generation();
        let mut api_order = api::Order::from_identifiers(identifiers, not_before, not_after);

        let new_order_url = inner
            .directory
            .endpoint(&*inner.http, Operation::NewOrder)
            .await?;
        let payload = serde_json::to_vec(&api_order)?;

        let signer = Signer::Account {
            generation: Some(generation),
        };
        let res = inner.call(&new_order_url, &payload, signer).await?;
        let order_url = req_expect_header(&res, "location")?;
        log::debug!("Order URL is: {order_url}");

        api_order.overwrite(read_json(&res)?)?;

        Order::from_api(inner, generation, order_url, api_order, &res)
    }

    /// Resumes an order created earlier, fetching its current state.
    pub async fn order(&self, url: &str) -> Result<Order> {
        let inner = &self.inner;
        let generation = inner.key_generation();

        let res = inner.post_as_get(url, Some(generation)).await?;
        let api_order = read_json(&res)?;

        Order::from_api(inner, generation, url.to_owned(), api_order, &res)
    }
}

/// One certificate order and its last observed state.
///
/// The status only moves forward: a refresh reporting an earlier status than the one already
/// seen fails with [`Error::UnexpectedResponse`] and leaves the order as it was.
///
/// Dropping a future returned by one of the polling methods stops polling. The order keeps the
/// state of the last completed refresh.
#[derive(Debug)]
pub struct Order {
    ctx: Arc<ContextInner>,
    generation: u64,
    url: String,
    status: OrderStatus,
    api_order: api::Order,
    retry_after: Option<Duration>,
}

impl Order {
    fn from_api(
        ctx: &Arc<ContextInner>,
        generation: u64,
        url: String,
        api_order: api::Order,
        res: &HttpResponse,
    ) -> Result<Self> {
        let status = api_order
            .status
            .ok_or_else(|| Error::UnexpectedResponse("order without status".to_owned()))?;

        Ok(Order {
            ctx: Arc::clone(ctx),
            generation,
            url,
            status,
            api_order,
            retry_after: retry_after(res),
        })
    }

    /// Resource URL of the order.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last observed status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// URL the CSR is submitted to.
    pub fn finalize_url(&self) -> &str {
        &self.api_order.finalize
    }

    /// URL of the issued certificate, once the order is `valid`.
    pub fn certificate_url(&self) -> Option<&str> {
        self.api_order.certificate.as_deref()
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_order(&self) -> &api::Order {
        &self.api_order
    }

    /// Refresh the order state against the ACME API.
    ///
    /// RFC 8555 calls this a "POST-as-GET" against the order URL.
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self.ctx.post_as_get(&self.url, Some(self.generation)).await?;
        self.apply(&res)
    }

    fn apply(&mut self, res: &HttpResponse) -> Result<()> {
        let from_api: api::Order = read_json(res)?;

        let next = from_api
            .status
            .ok_or_else(|| Error::UnexpectedResponse("order without status".to_owned()))?;

        if !self.status.can_become(next) {
            return Err(Error::UnexpectedResponse(format!(
                "order status went from {:?} to {next:?}",
                self.status
            )));
        }

        let mut api_order = self.api_order.clone();
        api_order.overwrite(from_api)?;

        self.api_order = api_order;
        self.status = next;
        self.retry_after = retry_after(res);

        Ok(())
    }

    /// Fetches the authorizations of this order, one per identifier.
    ///
    /// If the order includes names that have not been authorized before, this list might contain
    /// a mix of already valid and not yet valid authorizations.
    pub async fn authorizations(&self) -> Result<Vec<Authorization>> {
        let mut result = vec![];

        for auth_url in self.api_order.authorizations.iter().flatten() {
            let res = self.ctx.post_as_get(auth_url, Some(self.generation)).await?;
            let api_auth = read_json::<api::Authorization>(&res)?;
            result.push(Authorization::new(
                &self.ctx,
                self.generation,
                auth_url.clone(),
                api_auth,
            ));
        }

        Ok(result)
    }

    /// Submits a DER encoded CSR.
    ///
    /// Only allowed once the order is `ready`; in any other status this fails with
    /// [`Error::InvalidState`] without contacting the authority. Afterwards the order is
    /// `processing` (or already `valid` if the authority issued immediately).
    pub async fn finalize(&mut self, csr_der: &[u8]) -> Result<()> {
        if self.status != OrderStatus::Ready {
            return Err(Error::InvalidState(format!(
                "order must be ready to finalize, is {:?}",
                self.status
            )));
        }

        let payload = serde_json::to_vec(&api::Finalize::from_der(csr_der))?;
        let signer = Signer::Account {
            generation: Some(self.generation),
        };

        // if the CSR is invalid, we will get a 4xx code back
        let res = self
            .ctx
            .call(&self.api_order.finalize, &payload, signer)
            .await?;

        if res.body.iter().all(u8::is_ascii_whitespace) {
            self.retry_after = retry_after(&res);
        } else {
            self.apply(&res)?;
        }

        if self.status == OrderStatus::Ready {
            self.status = OrderStatus::Processing;
            self.api_order.status = Some(OrderStatus::Processing);
        }

        Ok(())
    }

    /// Builds a CSR for the order's identifiers, signed by `key`, and submits it.
    ///
    /// The certificate will be issued for the public half of `key`. See
    /// [`create_p256_key`](crate::create_p256_key).
    pub async fn finalize_with_key(&mut self, key: &p256::ecdsa::SigningKey) -> Result<()> {
        let csr = create_csr(key, &self.api_order.domains())?;
        let csr_der = csr
            .to_der()
            .map_err(|err| Error::Signing(format!("encode CSR: {err}")))?;

        self.finalize(&csr_der).await
    }

    /// Polls until the order is `ready` (or beyond).
    ///
    /// Use after the challenges have been validated.
    pub async fn wait_until_ready(&mut self, poll_interval: Duration, timeout: Duration) -> Result<()> {
        self.poll_until(poll_interval, timeout, |status| status != OrderStatus::Pending)
            .await
    }

    /// Polls until the order is `valid`.
    ///
    /// A `Retry-After` hint from the authority takes precedence over `poll_interval`. Fails with
    /// [`Error::Timeout`] as soon as the next poll would happen after `timeout` has elapsed, so a
    /// timeout shorter than the first wait fails without any request. An `invalid` order fails
    /// with [`Error::OrderFailed`] carrying the authority's problem.
    pub async fn wait_for_certificate(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        self.poll_until(poll_interval, timeout, OrderStatus::is_terminal)
            .await
    }

    async fn poll_until(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
        done: impl Fn(OrderStatus) -> bool,
    ) -> Result<()> {
        // a timeout too large to represent means no deadline
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if self.status == OrderStatus::Invalid {
                return Err(Error::OrderFailed(self.api_order.error.clone()));
            }

            if done(self.status) {
                return Ok(());
            }

            let delay = self.retry_after.take().unwrap_or(poll_interval);

            let too_late = match (Instant::now().checked_add(delay), deadline) {
                (None, _) => true,
                (Some(wake), Some(deadline)) => wake > deadline,
                (Some(_), None) => false,
            };

            if too_late {
                log::debug!("Giving up on order in status {:?}", self.status);
                return Err(Error::Timeout(timeout));
            }

            log::debug!("Order is {:?}, polling again in {delay:?}", self.status);
            tokio::time::sleep(delay).await;

            self.refresh().await?;
        }
    }

    /// Request download of the issued certificate.
    ///
    /// Only allowed once the order is `valid`. Returns the PEM chain exactly as served; an empty
    /// body fails with [`Error::UnexpectedResponse`].
    pub async fn download_certificate(&self) -> Result<Vec<u8>> {
        if self.status != OrderStatus::Valid {
            return Err(Error::InvalidState(format!(
                "order must be valid to download, is {:?}",
                self.status
            )));
        }

        let url = self.certificate_url().ok_or_else(|| {
            Error::UnexpectedResponse("valid order without certificate url".to_owned())
        })?;

        let res = self.ctx.post_as_get(url, Some(self.generation)).await?;

        if res.body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::UnexpectedResponse(
                "empty certificate chain".to_owned(),
            ));
        }

        Ok(res.body)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        create_p256_key,
        key::AccountKey,
        test::{mock_context, mock_url, MockAuthority, TEST_CHAIN},
    };

    async fn ready_order(authority: MockAuthority) -> (AcmeContext, Arc<crate::test::MockHttp>, Order) {
        let (ctx, http) = mock_context(authority);
        ctx.get_or_create(&["mailto:a@example.com"], true)
            .await
            .unwrap();

        let mut order = ctx.new_order(&["example.com"], None, None).await.unwrap();
        order.refresh().await.unwrap();
        assert_eq!(order.status(), OrderStatus::Ready);

        (ctx, http, order)
    }

    #[tokio::test]
    async fn new_order_is_pending() {
        let (ctx, http) = mock_context(MockAuthority::default());
        ctx.get_or_create(&["mailto:a@example.com"], true)
            .await
            .unwrap();

        let order = ctx
            .new_order(&["example.com", "www.example.com", "example.com"], None, None)
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.url(), mock_url("/acme/order/1"));
        assert_eq!(order.finalize_url(), mock_url("/acme/finalize/1"));
        assert_eq!(order.api_order().domains(), ["example.com", "www.example.com"]);

        let req = &http.signed_to(&mock_url("/acme/new-order"))[0];
        assert_eq!(req.header["kid"], ctx.account_url().unwrap().as_str());
        assert_eq!(req.payload_json()["identifiers"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn new_order_rejects_empty_identifiers() {
        let (ctx, _http) = mock_context(MockAuthority::default());
        ctx.get_or_create(&[], true).await.unwrap();

        let err = ctx.new_order(&[], None, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn new_order_requires_account() {
        let (ctx, http) = mock_context(MockAuthority::default());

        let err = ctx.new_order(&["example.com"], None, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(http.signed().is_empty());
    }

    #[tokio::test]
    async fn finalize_when_not_ready_sends_nothing() {
        let (ctx, http) = mock_context(MockAuthority::default());
        ctx.get_or_create(&[], true).await.unwrap();
        let mut order = ctx.new_order(&["example.com"], None, None).await.unwrap();

        let before = http.requests().len();
        let err = order.finalize(b"csr").await.unwrap_err();

        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(http.requests().len(), before);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn finalize_moves_to_processing() {
        let (_ctx, http, mut order) = ready_order(MockAuthority::default()).await;

        order.finalize(&[1, 2, 3]).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);

        let req = &http.signed_to(&mock_url("/acme/finalize/1"))[0];
        assert_eq!(req.payload_json(), serde_json::json!({ "csr": "AQID" }));
    }

    #[tokio::test]
    async fn finalize_retries_bad_nonce_once() {
        let authority = MockAuthority {
            bad_nonces_on_finalize: 1,
            ..Default::default()
        };
        let (_ctx, http, mut order) = ready_order(authority).await;

        order.finalize(&[1, 2, 3]).await.unwrap();

        let attempts = http.signed_to(&mock_url("/acme/finalize/1"));
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0].header["nonce"], attempts[1].header["nonce"]);

        let nonces = http.signed_nonces();
        assert_eq!(nonces.iter().collect::<HashSet<_>>().len(), nonces.len());
    }

    #[tokio::test]
    async fn finalize_second_bad_nonce_fails() {
        let authority = MockAuthority {
            bad_nonces_on_finalize: 2,
            ..Default::default()
        };
        let (_ctx, http, mut order) = ready_order(authority).await;

        let err = order.finalize(&[1, 2, 3]).await.unwrap_err();

        assert!(matches!(err, Error::Protocol(p) if p.is_bad_nonce()));
        assert_eq!(http.posts_to(&mock_url("/acme/finalize/1")), 2);
        assert_eq!(order.status(), OrderStatus::Ready);
    }

    #[tokio::test]
    async fn status_regression_is_rejected() {
        let authority = MockAuthority {
            order_statuses: vec!["ready", "pending"],
            ..Default::default()
        };
        let (_ctx, _http, mut order) = ready_order(authority).await;

        let err = order.refresh().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
        assert_eq!(order.status(), OrderStatus::Ready);
        assert_eq!(order.api_order().status, Some(OrderStatus::Ready));
    }

    #[tokio::test]
    async fn wait_times_out_before_first_poll() {
        let (ctx, http) = mock_context(MockAuthority::default());
        ctx.get_or_create(&[], true).await.unwrap();
        let mut order = ctx.new_order(&["example.com"], None, None).await.unwrap();

        let before = http.requests().len();
        let err = order
            .wait_for_certificate(Duration::from_secs(10), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(http.requests().len(), before);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_honors_retry_after() {
        let authority = MockAuthority {
            order_statuses: vec!["ready", "processing", "processing", "valid"],
            retry_after: Some("3"),
            ..Default::default()
        };
        let (_ctx, _http, mut order) = ready_order(authority).await;
        order.finalize(&[1]).await.unwrap();

        // the retry-after hint from the last refresh beats the 1 ms poll interval
        let started = Instant::now();
        order
            .wait_for_certificate(Duration::from_millis(1), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Valid);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn invalid_order_surfaces_problem() {
        let authority = MockAuthority {
            order_statuses: vec!["ready", "invalid"],
            ..Default::default()
        };
        let (_ctx, _http, mut order) = ready_order(authority).await;
        order.finalize(&[1]).await.unwrap();

        let err = order
            .wait_for_certificate(Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap_err();

        let Error::OrderFailed(Some(problem)) = err else {
            panic!("expected order failure, got {err:?}");
        };
        assert_eq!(problem.short_type(), "badCSR");
    }

    #[tokio::test]
    async fn download_only_when_valid() {
        let authority = MockAuthority {
            order_statuses: vec!["ready", "valid"],
            ..Default::default()
        };
        let (_ctx, _http, mut order) = ready_order(authority).await;

        assert!(matches!(
            order.download_certificate().await,
            Err(Error::InvalidState(_))
        ));

        order.finalize_with_key(&create_p256_key()).await.unwrap();
        order
            .wait_for_certificate(Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();

        let pem = order.download_certificate().await.unwrap();
        assert_eq!(pem, TEST_CHAIN.as_bytes());
    }

    #[tokio::test]
    async fn order_is_stale_after_key_change() {
        let (ctx, http, mut order) = ready_order(MockAuthority::default()).await;

        ctx.change_key(AccountKey::generate_p256()).await.unwrap();

        let before = http.requests().len();
        assert!(matches!(order.refresh().await, Err(Error::StaleKey)));
        assert!(matches!(order.finalize(&[1]).await, Err(Error::StaleKey)));
        assert_eq!(http.requests().len(), before);

        // a fresh handle signs with the new key
        let mut resumed = ctx.order(order.url()).await.unwrap();
        resumed.refresh().await.unwrap();
    }

    #[tokio::test]
    async fn order_body_without_identifiers() {
        let authority = MockAuthority {
            echo_identifiers: false,
            order_statuses: vec!["ready", "valid"],
            ..Default::default()
        };
        let (ctx, _http) = mock_context(authority);
        ctx.get_or_create(&["mailto:a@example.com"], true)
            .await
            .unwrap();

        let mut order = ctx.new_order(&["example.com"], None, None).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.finalize_url(), mock_url("/acme/finalize/1"));
        assert_eq!(order.api_order().domains(), ["example.com"]);

        order.refresh().await.unwrap();
        assert_eq!(order.status(), OrderStatus::Ready);
        assert_eq!(order.api_order().domains(), ["example.com"]);

        order.finalize_with_key(&create_p256_key()).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);
    }

    #[tokio::test]
    async fn huge_retry_after_times_out() {
        let authority = MockAuthority {
            order_statuses: vec!["pending"],
            retry_after: Some("18446744073709551615"),
            ..Default::default()
        };
        let (ctx, _http) = mock_context(authority);
        ctx.get_or_create(&[], true).await.unwrap();

        let mut order = ctx.new_order(&["example.com"], None, None).await.unwrap();
        order.refresh().await.unwrap();

        let err = order
            .wait_for_certificate(Duration::from_millis(1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn unbounded_timeout_still_polls() {
        let authority = MockAuthority {
            order_statuses: vec!["ready"],
            ..Default::default()
        };
        let (ctx, _http) = mock_context(authority);
        ctx.get_or_create(&[], true).await.unwrap();

        let mut order = ctx.new_order(&["example.com"], None, None).await.unwrap();
        order
            .wait_until_ready(Duration::from_millis(1), Duration::MAX)
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Ready);
    }

    #[tokio::test]
    async fn empty_certificate_is_rejected() {
        let authority = MockAuthority {
            order_statuses: vec!["ready", "valid"],
            certificate_chain: "",
            ..Default::default()
        };
        let (_ctx, _http, mut order) = ready_order(authority).await;

        order.finalize(&[1]).await.unwrap();
        order
            .wait_for_certificate(Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(matches!(
            order.download_certificate().await,
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn full_flow_against_test_server() {
        let server = crate::test::with_directory_server();
        let ctx = crate::test::server_context(&server);
        ctx.get_or_create(&["mailto:foo@bar.com"], true)
            .await
            .unwrap();

        let mut order = ctx
            .new_order(&["acme-test.example.com"], None, None)
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);

        let authz = order.authorizations().await.unwrap();
        assert_eq!(authz.len(), 1);

        order
            .wait_until_ready(Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();
        order.finalize_with_key(&create_p256_key()).await.unwrap();
        order
            .wait_for_certificate(Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();

        let cert = order.download_certificate().await.unwrap();
        assert_eq!(cert, b"CERT HERE");
    }
}
