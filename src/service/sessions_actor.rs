use crate::dbmanager::account::{AuthAccount, AuthAccounts, CacheLookup};
use crate::error::PanelError;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Upper bound on how long expired sessions linger before a sweep removes them.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Public messages handled by the sessions actor.
#[derive(Debug)]
pub enum SessionsActorMessage {
    /// Look up cached credentials for (session id, cache key).
    Lookup(String, String, RpcReplyPort<CacheLookup>),
    /// Cache credentials that just logged in successfully.
    Store {
        session_id: String,
        key: String,
        account: AuthAccount,
    },
    /// Drop one cached entry; an emptied session loses its cache entirely.
    Forget { session_id: String, key: String },
    /// Drop everything cached for a session.
    Clear(String),
    /// List cache keys held for a session.
    Keys(String, RpcReplyPort<Vec<String>>),
    /// Drop sessions idle for longer than the ttl. Sent periodically by the actor itself.
    Sweep,
}

/// Handle for interacting with the sessions actor.
#[derive(Clone)]
pub struct SessionsHandle {
    actor: ActorRef<SessionsActorMessage>,
}

impl SessionsHandle {
    pub async fn lookup(
        &self,
        session_id: impl AsRef<str>,
        key: impl AsRef<str>,
    ) -> Result<CacheLookup, PanelError> {
        ractor::call!(
            self.actor,
            SessionsActorMessage::Lookup,
            session_id.as_ref().to_string(),
            key.as_ref().to_string()
        )
        .map_err(|e| PanelError::RactorError(format!("Lookup RPC failed: {e}")))
    }

    pub async fn store(&self, session_id: impl AsRef<str>, key: String, account: AuthAccount) {
        let _ = ractor::cast!(
            self.actor,
            SessionsActorMessage::Store {
                session_id: session_id.as_ref().to_string(),
                key,
                account
            }
        );
    }

    pub async fn forget(&self, session_id: impl AsRef<str>, key: impl AsRef<str>) {
        let _ = ractor::cast!(
            self.actor,
            SessionsActorMessage::Forget {
                session_id: session_id.as_ref().to_string(),
                key: key.as_ref().to_string()
            }
        );
    }

    pub async fn clear(&self, session_id: impl AsRef<str>) {
        let _ = ractor::cast!(
            self.actor,
            SessionsActorMessage::Clear(session_id.as_ref().to_string())
        );
    }

    pub async fn keys(&self, session_id: impl AsRef<str>) -> Result<Vec<String>, PanelError> {
        ractor::call!(
            self.actor,
            SessionsActorMessage::Keys,
            session_id.as_ref().to_string()
        )
        .map_err(|e| PanelError::RactorError(format!("Keys RPC failed: {e}")))
    }
}

struct Session {
    accounts: AuthAccounts,
    last_seen: Instant,
}

/// Cached credentials by session id. A session idle for longer than `ttl` is
/// treated as absent and removed on the next sweep.
struct SessionsActorState {
    sessions: HashMap<String, Session>,
    ttl: Duration,
}

impl SessionsActorState {
    fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// The live session for `session_id`, refreshing its idle timer.
    fn touch(&mut self, session_id: &str, now: Instant) -> Option<&mut AuthAccounts> {
        let expired = self
            .sessions
            .get(session_id)
            .is_some_and(|s| now.saturating_duration_since(s.last_seen) > self.ttl);
        if expired {
            self.sessions.remove(session_id);
            return None;
        }
        let session = self.sessions.get_mut(session_id)?;
        session.last_seen = now;
        Some(&mut session.accounts)
    }

    fn store(
        &mut self,
        session_id: String,
        key: String,
        account: AuthAccount,
        now: Instant,
    ) -> usize {
        // drops the session first when it has already expired
        let _ = self.touch(&session_id, now);
        let session = self.sessions.entry(session_id).or_insert_with(|| Session {
            accounts: AuthAccounts::new(),
            last_seen: now,
        });
        session.accounts.insert(key, account);
        session.accounts.len()
    }

    /// Remove expired sessions, returning how many were dropped.
    fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) <= ttl);
        before - self.sessions.len()
    }
}

struct SessionsActor;

#[ractor::async_trait]
impl Actor for SessionsActor {
    type Msg = SessionsActorMessage;
    type State = SessionsActorState;
    type Arguments = Duration;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        ttl: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let every = ttl.clamp(Duration::from_millis(10), MAX_SWEEP_INTERVAL);
        let _ = myself.send_interval(every, || SessionsActorMessage::Sweep);
        info!(ttl_secs = ttl.as_secs(), "SessionsActor started");
        Ok(SessionsActorState::new(ttl))
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let now = Instant::now();
        match message {
            SessionsActorMessage::Lookup(session_id, key, rp) => {
                let found = match state.touch(&session_id, now) {
                    Some(accounts) => accounts.lookup(&key),
                    None => CacheLookup::NoCache,
                };
                debug!(
                    key = %key,
                    hit = matches!(found, CacheLookup::Found(_)),
                    "session cache lookup"
                );
                let _ = rp.send(found);
            }
            SessionsActorMessage::Store {
                session_id,
                key,
                account,
            } => {
                let cached = state.store(session_id, key.clone(), account, now);
                debug!(key = %key, cached, "session credentials cached");
            }
            SessionsActorMessage::Forget { session_id, key } => {
                if let Some(accounts) = state.touch(&session_id, now) {
                    accounts.remove(&key);
                    if accounts.is_empty() {
                        state.sessions.remove(&session_id);
                    }
                }
            }
            SessionsActorMessage::Clear(session_id) => {
                state.sessions.remove(&session_id);
            }
            SessionsActorMessage::Keys(session_id, rp) => {
                let keys = state
                    .touch(&session_id, now)
                    .map(|accounts| accounts.keys())
                    .unwrap_or_default();
                let _ = rp.send(keys);
            }
            SessionsActorMessage::Sweep => {
                let evicted = state.evict_expired(now);
                if evicted > 0 {
                    info!(evicted, remaining = state.sessions.len(), "expired sessions evicted");
                }
            }
        }
        Ok(())
    }
}

/// Spawn an unnamed sessions actor whose sessions expire after `ttl` idle.
pub async fn spawn(ttl: Duration) -> Result<SessionsHandle, PanelError> {
    let (actor, _jh) = Actor::spawn(None, SessionsActor, ttl)
        .await
        .map_err(|e| PanelError::RactorError(format!("failed to spawn SessionsActor: {e}")))?;
    Ok(SessionsHandle { actor })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(db: &str) -> AuthAccount {
        AuthAccount {
            driver: "sqlite".into(),
            db: db.into(),
            ..AuthAccount::default()
        }
    }

    #[tokio::test]
    async fn lookup_reports_tri_state() {
        let handle = spawn(Duration::from_secs(60)).await.unwrap();

        assert_eq!(
            handle.lookup("sid", "k1").await.unwrap(),
            CacheLookup::NoCache
        );

        handle.store("sid", "k1".into(), account("a.db")).await;
        assert_eq!(
            handle.lookup("sid", "k1").await.unwrap(),
            CacheLookup::Found(account("a.db"))
        );
        assert_eq!(
            handle.lookup("sid", "k2").await.unwrap(),
            CacheLookup::NotFound
        );
        assert_eq!(
            handle.lookup("other", "k1").await.unwrap(),
            CacheLookup::NoCache
        );
    }

    #[tokio::test]
    async fn forgetting_last_entry_drops_the_cache() {
        let handle = spawn(Duration::from_secs(60)).await.unwrap();
        handle.store("sid", "k1".into(), account("a.db")).await;
        handle.store("sid", "k2".into(), account("b.db")).await;
        assert_eq!(handle.keys("sid").await.unwrap(), vec!["k1", "k2"]);

        handle.forget("sid", "k1").await;
        assert_eq!(
            handle.lookup("sid", "k1").await.unwrap(),
            CacheLookup::NotFound
        );

        handle.forget("sid", "k2").await;
        assert_eq!(
            handle.lookup("sid", "k2").await.unwrap(),
            CacheLookup::NoCache
        );

        handle.store("sid", "k3".into(), account("c.db")).await;
        handle.clear("sid").await;
        assert!(handle.keys("sid").await.unwrap().is_empty());
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let ttl = Duration::from_secs(10);
        let mut state = SessionsActorState::new(ttl);
        let start = Instant::now();

        state.store("old".into(), "k".into(), account("a.db"), start);
        state.store("busy".into(), "k".into(), account("b.db"), start);
        // activity keeps a session alive
        assert!(state.touch("busy", start + Duration::from_secs(8)).is_some());

        assert_eq!(state.evict_expired(start + Duration::from_secs(15)), 1);
        assert!(!state.sessions.contains_key("old"));
        assert!(state.sessions.contains_key("busy"));

        assert_eq!(state.evict_expired(start + Duration::from_secs(30)), 1);
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn expired_session_reads_as_absent_before_any_sweep() {
        let mut state = SessionsActorState::new(Duration::from_secs(10));
        let start = Instant::now();
        state.store("sid".into(), "k1".into(), account("a.db"), start);

        assert!(state.touch("sid", start + Duration::from_secs(11)).is_none());
        assert!(state.sessions.is_empty());

        // storing again starts a fresh session without the stale entries
        state.store("sid".into(), "k2".into(), account("b.db"), start + Duration::from_secs(11));
        assert_eq!(
            state.touch("sid", start + Duration::from_secs(12)).map(|a| a.keys()),
            Some(vec!["k2".to_string()])
        );
    }

    #[tokio::test]
    async fn handle_stops_serving_expired_sessions() {
        let handle = spawn(Duration::from_millis(50)).await.unwrap();
        handle.store("sid", "k1".into(), account("a.db")).await;
        assert!(matches!(
            handle.lookup("sid", "k1").await.unwrap(),
            CacheLookup::Found(_)
        ));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            handle.lookup("sid", "k1").await.unwrap(),
            CacheLookup::NoCache
        );
        assert!(handle.keys("sid").await.unwrap().is_empty());
    }
}
