use crate::config::Config;
use crate::db::AccountsStorage;
use crate::dbmanager::DriverRegistry;
use crate::error::PanelError;
use crate::handlers::{db_manager, upload};
use crate::service::sessions_actor::{self, SessionsHandle};
use crate::upload::{ClientRegistry, LocalStorer, OverlayWatermarker, UploadPipeline};
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct PanelState {
    pub storage: AccountsStorage,
    pub drivers: Arc<DriverRegistry>,
    pub sessions: SessionsHandle,
    pub uploader: UploadPipeline,
    pub panel_key: Arc<str>,
    /// Encrypts the session cookie. Sessions live in memory, so a key per process is enough.
    pub cookie_key: Key,
    /// Idle lifetime shared by the session cookie and the cached credentials.
    pub session_ttl: Duration,
    pub upload_body_limit: usize,
    pub watermark_file: Option<Arc<PathBuf>>,
    pub allowed_extensions: Arc<[String]>,
}

impl PanelState {
    pub fn new(
        storage: AccountsStorage,
        drivers: Arc<DriverRegistry>,
        sessions: SessionsHandle,
        uploader: UploadPipeline,
        cfg: &Config,
    ) -> Self {
        Self {
            storage,
            drivers,
            sessions,
            uploader,
            panel_key: Arc::from(cfg.panel_key.as_str()),
            cookie_key: Key::generate(),
            session_ttl: cfg.session_ttl(),
            upload_body_limit: cfg.upload_body_limit,
            watermark_file: cfg.watermark_file.clone().map(Arc::new),
            allowed_extensions: cfg.allowed_extensions().into(),
        }
    }

    /// Open the account store, spawn the sessions actor and wire the built-in
    /// drivers and upload clients.
    pub async fn build(cfg: &Config) -> Result<Self, PanelError> {
        let storage = AccountsStorage::open(&cfg.database_url).await?;
        let sessions = sessions_actor::spawn(cfg.session_ttl()).await?;
        let uploader = UploadPipeline::new(
            Arc::new(ClientRegistry::builtin()),
            Arc::new(LocalStorer::new(
                cfg.upload_root.clone(),
                cfg.upload_url_prefix.clone(),
            )),
            Arc::new(OverlayWatermarker::default()),
        );
        Ok(Self::new(
            storage,
            Arc::new(DriverRegistry::builtin()),
            sessions,
            uploader,
            cfg,
        ))
    }
}

impl FromRef<PanelState> for Key {
    fn from_ref(state: &PanelState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn panel_router(state: PanelState) -> Router {
    let body_limit = state.upload_body_limit;

    let db_routes = Router::new()
        .route(
            "/db/accounts",
            get(db_manager::list_accounts).post(db_manager::create_account),
        )
        .route(
            "/db/accounts/{id}",
            get(db_manager::get_account)
                .put(db_manager::update_account)
                .delete(db_manager::delete_account),
        )
        .route("/db/auth", post(db_manager::authenticate))
        .route("/db/logout", post(db_manager::logout))
        .route("/db/session", get(db_manager::session_keys));

    let upload_routes = Router::new()
        .route("/upload/{client}", post(upload::upload))
        .layer(DefaultBodyLimit::max(body_limit));

    db_routes.merge(upload_routes).with_state(state)
}
