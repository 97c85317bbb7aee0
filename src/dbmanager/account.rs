use crate::error::PanelError;
use std::collections::HashMap;
use std::fmt;

/// Character set applied when an account does not specify one.
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Credentials for one login attempt against a database engine.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthAccount {
    pub driver: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub db: String,
    pub charset: String,
    pub account_id: i64,
}

impl AuthAccount {
    pub fn copy_from(&mut self, other: &AuthAccount) {
        self.clone_from(other);
    }

    /// Key under which these credentials are cached for the session.
    pub fn cache_key(&self) -> String {
        gen_key(
            &self.driver,
            &self.username,
            &self.host,
            &self.db,
            self.account_id,
        )
    }

    /// A login needs a driver and something to connect to.
    pub fn ensure_complete(&self) -> Result<(), PanelError> {
        if self.driver.is_empty() {
            return Err(PanelError::EmptyCredentials("driver is required"));
        }
        if self.host.is_empty() && self.db.is_empty() {
            return Err(PanelError::EmptyCredentials("host or database is required"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.ensure_complete().is_err()
    }
}

impl fmt::Debug for AuthAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthAccount")
            .field("driver", &self.driver)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("db", &self.db)
            .field("charset", &self.charset)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Derive the cache key for a set of credentials.
///
/// Stored accounts are keyed by id alone; ad-hoc logins by their connection target.
pub fn gen_key(driver: &str, username: &str, host: &str, db: &str, account_id: i64) -> String {
    if account_id > 0 {
        return format!("account:{account_id}");
    }
    format!("{driver}://{username}@{host}/{db}")
}

/// Outcome of a session cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Found(AuthAccount),
    /// The session has cached accounts, none under this key.
    NotFound,
    /// The session has no cached accounts at all.
    NoCache,
}

/// Why a cache lookup produced no credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMiss {
    NotFound,
    NoCache,
}

impl CacheMiss {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMiss::NotFound => "not_found",
            CacheMiss::NoCache => "no_cache",
        }
    }
}

/// Credentials that logged in successfully during one session, by cache key.
#[derive(Debug, Clone, Default)]
pub struct AuthAccounts {
    entries: HashMap<String, AuthAccount>,
}

impl AuthAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AuthAccount> {
        self.entries.get(key)
    }

    pub fn lookup(&self, key: &str) -> CacheLookup {
        match self.get(key) {
            Some(account) => CacheLookup::Found(account.clone()),
            None => CacheLookup::NotFound,
        }
    }

    pub fn insert(&mut self, key: String, account: AuthAccount) -> Option<AuthAccount> {
        self.entries.insert(key, account)
    }

    pub fn remove(&mut self, key: &str) -> Option<AuthAccount> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthAccount {
        AuthAccount {
            driver: "mysql".into(),
            username: "root".into(),
            password: "pw".into(),
            host: "127.0.0.1:3306".into(),
            db: "app".into(),
            charset: DEFAULT_CHARSET.into(),
            account_id: 0,
        }
    }

    #[test]
    fn key_prefers_account_id() {
        assert_eq!(gen_key("", "", "", "", 42), "account:42");
        assert_eq!(gen_key("mysql", "root", "h", "d", 7), "account:7");
        assert_eq!(gen_key("mysql", "root", "h", "d", 0), "mysql://root@h/d");
        assert_eq!(sample().cache_key(), "mysql://root@127.0.0.1:3306/app");
    }

    #[test]
    fn completeness_requires_driver_and_target() {
        assert!(sample().ensure_complete().is_ok());

        let mut no_driver = sample();
        no_driver.driver.clear();
        assert!(matches!(
            no_driver.ensure_complete(),
            Err(PanelError::EmptyCredentials(_))
        ));

        let mut no_target = sample();
        no_target.host.clear();
        no_target.db.clear();
        assert!(no_target.is_empty());

        let mut file_only = sample();
        file_only.host.clear();
        assert!(!file_only.is_empty());
    }

    #[test]
    fn debug_output_hides_password() {
        let printed = format!("{:?}", sample());
        assert!(!printed.contains("\"pw\""));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn lookup_distinguishes_hit_and_miss() {
        let mut accounts = AuthAccounts::new();
        let account = sample();
        accounts.insert(account.cache_key(), account.clone());

        assert_eq!(
            accounts.lookup(&account.cache_key()),
            CacheLookup::Found(account)
        );
        assert_eq!(accounts.lookup("account:1"), CacheLookup::NotFound);
        assert_eq!(accounts.len(), 1);
    }
}
