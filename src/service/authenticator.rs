//! Resolve which credentials to log in with, then log in.
//!
//! Stored accounts are loaded from their persisted record. Without an account
//! id the credentials come from the session cache, keyed by the connection
//! target the caller asked for.

use crate::db::models::DbAccount;
use crate::dbmanager::account::{AuthAccount, CacheLookup, CacheMiss, DEFAULT_CHARSET, gen_key};
use crate::dbmanager::{Manager, Operation};
use crate::error::PanelError;
use tracing::{debug, warn};

/// Result of an authentication attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    LoggedIn,
    /// Nothing to log in with; no attempt was made.
    NotCached(CacheMiss),
}

impl Authentication {
    pub fn succeeded(&self) -> bool {
        matches!(self, Authentication::LoggedIn)
    }
}

/// Authenticate `mgr` either from the stored `model` (when `account_id > 0`)
/// or from the session cache using the target already set on `mgr.account()`.
pub async fn authenticate(
    mgr: &mut Manager,
    account_id: i64,
    model: Option<&DbAccount>,
) -> Result<Authentication, PanelError> {
    if account_id > 0 {
        let model = model.ok_or(PanelError::AccountNotFound(account_id))?;
        apply_model(mgr.account_mut(), model);

        let key = gen_key("", "", "", "", mgr.account().account_id);
        mgr.add_auth(key).await;
        let driver = mgr.account().driver.clone();
        mgr.run(&driver, Operation::Login).await?;
        return Ok(Authentication::LoggedIn);
    }

    let key = {
        let auth = mgr.account();
        gen_key(&auth.driver, &auth.username, &auth.host, &auth.db, account_id)
    };
    let cached = match mgr.sessions().lookup(mgr.session_id(), &key).await? {
        CacheLookup::Found(cached) => cached,
        CacheLookup::NotFound => {
            debug!(key = %key, "no cached credentials under key");
            return Ok(Authentication::NotCached(CacheMiss::NotFound));
        }
        CacheLookup::NoCache => {
            debug!("session has no cached credentials");
            return Ok(Authentication::NotCached(CacheMiss::NoCache));
        }
    };

    mgr.account_mut().copy_from(&cached);
    let driver = mgr.account().driver.clone();
    mgr.run(&driver, Operation::Login).await?;
    Ok(Authentication::LoggedIn)
}

/// Log in with credentials typed by the user and cache them on success.
pub async fn login_with(
    mgr: &mut Manager,
    mut auth: AuthAccount,
) -> Result<Authentication, PanelError> {
    if auth.charset.is_empty() {
        auth.charset = DEFAULT_CHARSET.to_string();
    }
    auth.account_id = 0;
    mgr.account_mut().copy_from(&auth);

    let driver = auth.driver.clone();
    mgr.run(&driver, Operation::Login).await?;
    mgr.add_auth(auth.cache_key()).await;
    Ok(Authentication::LoggedIn)
}

/// Copy every connection field of a stored account into `auth`.
pub fn apply_model(auth: &mut AuthAccount, model: &DbAccount) {
    auth.driver = model.engine.clone();
    auth.username = model.user.clone();
    auth.password = model.password.clone();
    auth.host = model.host.clone();
    auth.db = model.name.clone();
    auth.account_id = model.id;
    auth.charset.clear();

    match model.parsed_options() {
        Ok(opts) => auth.charset = opts.charset.unwrap_or_default(),
        Err(e) => warn!(account_id = model.id, error = %e, "ignoring malformed account options"),
    }
    if auth.charset.is_empty() {
        auth.charset = DEFAULT_CHARSET.to_string();
    }
}
