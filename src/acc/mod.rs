use std::sync::Arc;

use reqwest::StatusCode;

use crate::{
    api,
    ctx::ContextInner,
    dir::Operation,
    error::*,
    jws::{jws_with, JwsProtectedHeader, KeyBinding},
    key::AccountKey,
    req::{req_expect_header, req_handle_error},
    trans::Signer,
    util::{read_json, read_json_or_default},
    AcmeContext,
};

/// Account with an ACME provider.
///
/// Obtained from [`AcmeContext::get_or_create()`] or [`AcmeContext::load_existing()`]. The handle
/// is pinned to the account key that was active when it was created; after a successful
/// [`AcmeContext::change_key()`] every signed operation through an older handle fails with
/// [`Error::StaleKey`].
#[derive(Debug, Clone)]
pub struct Account {
    ctx: Arc<ContextInner>,
    generation: u64,
    url: String,
    api_account: api::Account,
}

impl Account {
    /// Resource URL of the account. Also used as `kid` in signed requests.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns a reference to the account's API object.
    ///
    /// Useful for debugging.
    pub fn api_account(&self) -> &api::Account {
        &self.api_account
    }

    /// Fetches the account's current state.
    pub async fn refresh(&mut self) -> Result<()> {
        let res = self.ctx.post_as_get(&self.url, Some(self.generation)).await?;
        self.api_account = read_json(&res)?;
        Ok(())
    }

    /// Replaces the contact list and, if `agree_terms` is set, records agreement to the terms of
    /// service.
    pub async fn update(&mut self, contacts: &[&str], agree_terms: bool) -> Result<()> {
        self.post(&api::Account::update(contacts, agree_terms)).await
    }

    /// Deactivates the account.
    ///
    /// The authority refuses any further request signed with this account's key.
    pub async fn deactivate(&mut self) -> Result<()> {
        self.post(&api::Deactivation).await
    }

    async fn post<T: serde::Serialize + ?Sized>(&mut self, payload: &T) -> Result<()> {
        let payload = serde_json::to_vec(payload)?;
        let signer = Signer::Account {
            generation: Some(self.generation),
        };

        let res = self.ctx.call(&self.url, &payload, signer).await?;
        self.api_account = read_json_or_default(&res)?;
        Ok(())
    }
}

impl AcmeContext {
    /// Registers an account for the active key, or looks up the one already registered.
    ///
    /// `contacts` are URLs such as `mailto:admin@example.com`. An authority reporting that the key
    /// is already registered is treated as success.
    pub async fn get_or_create(&self, contacts: &[&str], agree_terms: bool) -> Result<Account> {
        self.new_account(&api::Account::registration(contacts, agree_terms))
            .await
    }

    /// Looks up the account registered for the active key without creating one.
    ///
    /// Fails with the authority's `accountDoesNotExist` problem if there is none.
    pub async fn load_existing(&self) -> Result<Account> {
        self.new_account(&api::Account::lookup()).await
    }

    async fn new_account(&self, payload: &api::Account) -> Result<Account> {
        let inner = &self.inner;

        let url = inner
            .directory
            .endpoint(&*inner.http, Operation::NewAccount)
            .await?;
        let payload = serde_json::to_vec(payload)?;

        // a key change racing this call fails it with StaleKey instead of returning a stale handle
        let generation = inner.key_generation();
        let res = inner
            .call_raw(&url, &payload, Signer::AccountJwk { generation })
            .await?;

        // some authorities answer a duplicate registration with 409 and the existing location
        let existing =
            res.status == StatusCode::CONFLICT && res.header("location").is_some();
        let res = if existing { res } else { req_handle_error(res)? };

        let kid = req_expect_header(&res, "location")?;
        log::debug!("Key ID is: {kid}");
        inner.set_account_url(kid.clone());

        let api_account = if existing {
            let res = inner.post_as_get(&kid, Some(generation)).await?;
            read_json(&res)?
        } else {
            read_json_or_default(&res)?
        };

        Ok(Account {
            ctx: Arc::clone(inner),
            generation,
            url: kid,
            api_account,
        })
    }

    /// Rolls the account over to `new_key`.
    ///
    /// The request is an outer JWS signed by the current key and addressed by `kid`, carrying an
    /// inner JWS signed by `new_key` that binds the account URL to the old public key. On success
    /// `new_key` becomes the active key; handles created before the change fail with
    /// [`Error::StaleKey`] from then on.
    ///
    /// Key changes on the same context are serialized.
    pub async fn change_key(&self, new_key: AccountKey) -> Result<Account> {
        let inner = &self.inner;
        let _rotation = inner.rotation.lock().await;

        let account_url = inner.require_account_url()?;
        let (old_jwk, generation) = {
            let active = inner.active_key.read();
            (active.key.public_jwk().clone(), active.generation)
        };

        if new_key.public_jwk() == &old_jwk {
            return Err(Error::InvalidArgument(
                "new account key is the same as the current one".to_owned(),
            ));
        }

        let url = inner
            .directory
            .endpoint(&*inner.http, Operation::KeyChange)
            .await?;

        let key_change = api::KeyChange {
            account: account_url.clone(),
            old_key: old_jwk,
        };
        let inner_payload = serde_json::to_vec(&key_change)?;

        // never sent on its own, so it carries no nonce
        let inner_protected = JwsProtectedHeader::new(&new_key, KeyBinding::Jwk, &url, None);
        let inner_jws = jws_with(&inner_protected, &new_key, &inner_payload)?;
        let outer_payload = serde_json::to_vec(&inner_jws)?;

        let signer = Signer::Account {
            generation: Some(generation),
        };
        let res = inner.call(&url, &outer_payload, signer).await?;
        let api_account = read_json_or_default(&res)?;

        let generation = inner.replace_key(new_key);
        log::debug!("Account key changed, generation {generation}");

        Ok(Account {
            ctx: Arc::clone(inner),
            generation,
            url: account_url,
            api_account,
        })
    }
}
