//! Engine for obtaining certificates from ACME (Automatic Certificate Management Environment)
//! providers such as [Let's Encrypt](https://letsencrypt.org/).
//!
//! It implements [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555): every request is
//! a flattened JWS signed by the account key, carrying a single-use nonce from the authority.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use acme::{create_p256_key, AccountKey, AcmeContext, DirectoryUrl};
//!
//! async fn issue() -> acme::Result<Vec<u8>> {
//!     let ctx = AcmeContext::new(DirectoryUrl::LetsEncryptStaging, AccountKey::generate_p256())?;
//!     ctx.get_or_create(&["mailto:admin@example.com"], true).await?;
//!
//!     let mut order = ctx.new_order(&["example.com"], None, None).await?;
//!
//!     for auth in order.authorizations().await? {
//!         if let Some(mut challenge) = auth.http_challenge() {
//!             let _proof = challenge.key_authorization()?;
//!             // serve `_proof` at /.well-known/acme-challenge/<token>
//!             challenge.validate().await?;
//!         }
//!     }
//!
//!     order.wait_until_ready(Duration::from_secs(2), Duration::from_secs(120)).await?;
//!     order.finalize_with_key(&create_p256_key()).await?;
//!     order.wait_for_certificate(Duration::from_secs(2), Duration::from_secs(120)).await?;
//!
//!     order.download_certificate().await
//! }
//! ```
//!
//! ## Examples
//!
//! Complete usage examples are provided in the `demos/` directory of the source repository.
//!
//! # Domain Ownership
//!
//! Most website TLS certificates tries to prove ownership/control over the domain they are issued
//! for. For ACME, this means proving you control either:
//!
//! - a server answering TLS or HTTP requests for that domain;
//! - the DNS server answering name lookups against the domain.
//!
//! This library computes the proofs (see [`Challenge`](order::Challenge)) but never provisions
//! them; there are points in the flow where you need to update either the web server or DNS
//! server before progressing to get the certificate.
//!
//! # Concurrency
//!
//! An [`AcmeContext`] is cheap to clone and can be shared between tasks. All clones share one
//! nonce store, so concurrent requests never present the same nonce. Independent contexts never
//! share nonces.
//!
//! # Rate Limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API is not being abused. It
//! might be tempting to put the poll interval really low in this library's polling calls, but
//! balance this against the real risk of having access cut off.
//!
//! ## Use Staging For Development!
//!
//! Especially take care to use the Let's Encrypt staging environment for development where the rate
//! limits are more relaxed. See [`DirectoryUrl::LetsEncryptStaging`].
//!
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acc;
mod cert;
mod ctx;
mod dir;
mod error;
mod jws;
mod key;
mod nonce;
mod req;
mod revoke;
mod trans;
mod util;

pub mod api;
pub mod order;


pub use crate::{
    acc::Account,
    cert::{create_csr, create_p256_key},
    ctx::AcmeContext,
    dir::{DirectoryUrl, Operation},
    error::{Error, Result},
    jws::{FlattenedJsonJws, Jwk, KeyBinding},
    key::{AccountKey, SignatureAlgorithm, MIN_RSA_BITS},
    req::{HttpClient, HttpRequest, HttpResponse, ReqwestClient},
    revoke::RevocationReason,
};
