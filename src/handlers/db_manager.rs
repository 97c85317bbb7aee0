use crate::db::{DbAccount, NewDbAccount};
use crate::dbmanager::{AuthAccount, CacheLookup, Manager, Operation, gen_key};
use crate::error::PanelError;
use crate::middleware::RequireKeyAuth;
use crate::router::PanelState;
use crate::service::authenticator::{self, Authentication};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration as StdDuration;
use time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "panel_sid";

/// Login form. `account_id > 0` selects a stored account and ignores the
/// other fields; otherwise a `password` means typed credentials and its
/// absence means "reuse what this session already logged in with".
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct AuthRequest {
    pub account_id: i64,
    pub driver: String,
    pub username: String,
    pub password: Option<String>,
    pub host: String,
    pub db: String,
    pub charset: String,
}

impl AuthRequest {
    fn into_account(self) -> (AuthAccount, bool) {
        let typed = self.password.is_some();
        let account = AuthAccount {
            driver: self.driver,
            username: self.username,
            password: self.password.unwrap_or_default(),
            host: self.host,
            db: self.db,
            charset: self.charset,
            account_id: 0,
        };
        (account, typed)
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LogoutRequest {
    pub account_id: i64,
    pub driver: String,
    pub username: String,
    pub host: String,
    pub db: String,
    /// Drop every cached login of the session.
    pub all: bool,
}

/// GET /db/accounts
pub async fn list_accounts(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
) -> Result<Json<Vec<DbAccount>>, PanelError> {
    Ok(Json(state.storage.list().await?))
}

/// GET /db/accounts/{id}
pub async fn get_account(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    Path(id): Path<i64>,
) -> Result<Json<DbAccount>, PanelError> {
    let account = state
        .storage
        .get_by_id(id)
        .await?
        .ok_or(PanelError::AccountNotFound(id))?;
    Ok(Json(account))
}

/// POST /db/accounts
pub async fn create_account(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    Json(new): Json<NewDbAccount>,
) -> Result<impl IntoResponse, PanelError> {
    ensure_known_driver(&state, &new)?;
    let id = state.storage.insert(&new).await?;
    let account = state
        .storage
        .get_by_id(id)
        .await?
        .ok_or(PanelError::AccountNotFound(id))?;
    info!(id, engine = %account.engine, "account created");
    Ok((StatusCode::CREATED, Json(account)))
}

/// PUT /db/accounts/{id}
pub async fn update_account(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    Path(id): Path<i64>,
    Json(new): Json<NewDbAccount>,
) -> Result<Json<DbAccount>, PanelError> {
    ensure_known_driver(&state, &new)?;
    if !state.storage.update_by_id(id, &new).await? {
        return Err(PanelError::AccountNotFound(id));
    }
    let account = state
        .storage
        .get_by_id(id)
        .await?
        .ok_or(PanelError::AccountNotFound(id))?;
    info!(id, "account updated");
    Ok(Json(account))
}

/// DELETE /db/accounts/{id}
pub async fn delete_account(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, PanelError> {
    if !state.storage.delete_by_id(id).await? {
        return Err(PanelError::AccountNotFound(id));
    }
    info!(id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_known_driver(state: &PanelState, new: &NewDbAccount) -> Result<(), PanelError> {
    if state.drivers.has(&new.engine) {
        Ok(())
    } else {
        Err(PanelError::UnknownDriver(new.engine.clone()))
    }
}

/// POST /db/auth
pub async fn authenticate(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    jar: PrivateCookieJar,
    Json(req): Json<AuthRequest>,
) -> Response {
    let (session_id, jar) = ensure_session(jar, state.session_ttl);
    let mut mgr = Manager::new(state.drivers.clone(), state.sessions.clone(), session_id);

    let outcome = match resolve(&state, &mut mgr, req).await {
        Ok(outcome) => outcome,
        Err(err) => return respond_with_error(jar, err),
    };

    let body = match outcome {
        Authentication::LoggedIn => {
            let account = mgr.account();
            json!({
                "authenticated": true,
                "driver": account.driver,
                "username": account.username,
                "host": account.host,
                "db": account.db,
                "charset": account.charset,
                "account_id": account.account_id,
            })
        }
        Authentication::NotCached(miss) => json!({
            "authenticated": false,
            "reason": miss.as_str(),
        }),
    };
    (jar, Json(body)).into_response()
}

async fn resolve(
    state: &PanelState,
    mgr: &mut Manager,
    req: AuthRequest,
) -> Result<Authentication, PanelError> {
    if req.account_id > 0 {
        let model = state.storage.get_by_id(req.account_id).await?;
        return authenticator::authenticate(mgr, req.account_id, model.as_ref()).await;
    }

    let (account, typed) = req.into_account();
    if typed {
        return authenticator::login_with(mgr, account).await;
    }
    mgr.account_mut().copy_from(&account);
    authenticator::authenticate(mgr, 0, None).await
}

/// POST /db/logout
pub async fn logout(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    jar: PrivateCookieJar,
    Json(req): Json<LogoutRequest>,
) -> Response {
    let Some(session_id) = current_session(&jar) else {
        return (jar, Json(json!({"logged_out": false, "reason": "no_cache"}))).into_response();
    };

    if req.all {
        state.sessions.clear(&session_id).await;
        info!("session credentials cleared");
        return (jar, Json(json!({"logged_out": true}))).into_response();
    }

    let key = gen_key(&req.driver, &req.username, &req.host, &req.db, req.account_id);
    let cached = match state.sessions.lookup(&session_id, &key).await {
        Ok(CacheLookup::Found(cached)) => cached,
        Ok(CacheLookup::NotFound) => {
            return (jar, Json(json!({"logged_out": false, "reason": "not_found"})))
                .into_response();
        }
        Ok(CacheLookup::NoCache) => {
            return (jar, Json(json!({"logged_out": false, "reason": "no_cache"})))
                .into_response();
        }
        Err(err) => return respond_with_error(jar, err),
    };

    let mut mgr = Manager::new(
        state.drivers.clone(),
        state.sessions.clone(),
        session_id.clone(),
    );
    mgr.account_mut().copy_from(&cached);
    // the cached login goes away even if the driver fails to close its side
    if let Err(err) = mgr.run(&cached.driver, Operation::Logout).await {
        warn!(key = %key, error = %err, "driver logout failed");
    }
    state.sessions.forget(&session_id, &key).await;

    (jar, Json(json!({"logged_out": true}))).into_response()
}

/// GET /db/session -> keys of the logins cached for this session.
pub async fn session_keys(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    jar: PrivateCookieJar,
) -> Response {
    let keys = match current_session(&jar) {
        Some(session_id) => match state.sessions.keys(&session_id).await {
            Ok(keys) => keys,
            Err(err) => return respond_with_error(jar, err),
        },
        None => Vec::new(),
    };
    (jar, Json(json!({ "keys": keys }))).into_response()
}

fn current_session(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|sid| !sid.is_empty())
}

/// The caller's session id, issuing a fresh session cookie when absent.
fn ensure_session(jar: PrivateCookieJar, ttl: StdDuration) -> (String, PrivateCookieJar) {
    if let Some(session_id) = current_session(&jar) {
        return (session_id, jar);
    }
    let session_id = Uuid::new_v4().simple().to_string();
    let jar = jar.add(build_cookie(SESSION_COOKIE, session_id.clone(), ttl));
    (session_id, jar)
}

fn build_cookie(name: &str, value: String, ttl: StdDuration) -> Cookie<'static> {
    let max_age = Duration::try_from(ttl).unwrap_or(Duration::MAX);
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: PanelError) -> Response {
    (jar, err.into_response()).into_response()
}
