use crate::dbmanager::account::AuthAccount;
use crate::dbmanager::driver::Driver;
use crate::error::PanelError;
use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tracing::debug;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;

pub struct MySqlDriver;

#[async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn login(&self, account: &AuthAccount) -> Result<(), PanelError> {
        let (host, port) = split_host_port(&account.host)?;
        let mut opts = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&account.username)
            .password(&account.password);
        if !account.charset.is_empty() {
            opts = opts.charset(&account.charset);
        }
        if !account.db.is_empty() {
            opts = opts.database(&account.db);
        }

        let failed = |e: sqlx::Error| PanelError::LoginFailed {
            driver: self.name().to_string(),
            reason: e.to_string(),
        };
        let mut conn = opts.connect().await.map_err(failed)?;
        conn.ping().await.map_err(failed)?;
        conn.close().await.map_err(failed)?;

        debug!(host, port, user = %account.username, "mysql login verified");
        Ok(())
    }
}

/// Split `host[:port]` or `[ipv6]:port`, defaulting both parts.
/// A bare IPv6 literal carries no port.
fn split_host_port(raw: &str) -> Result<(&str, u16), PanelError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok((DEFAULT_HOST, DEFAULT_PORT));
    }
    let invalid = || PanelError::InvalidAccount(format!("invalid host `{raw}`"));

    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = match tail {
            "" => DEFAULT_PORT,
            tail => parse_port(tail.strip_prefix(':').ok_or_else(invalid)?, raw)?,
        };
        return Ok((host, port));
    }
    if raw.matches(':').count() > 1 {
        return Ok((raw, DEFAULT_PORT));
    }

    match raw.split_once(':') {
        Some((host, port)) => {
            let host = if host.is_empty() { DEFAULT_HOST } else { host };
            Ok((host, parse_port(port, raw)?))
        }
        None => Ok((raw, DEFAULT_PORT)),
    }
}

fn parse_port(port: &str, raw: &str) -> Result<u16, PanelError> {
    port.parse::<u16>()
        .map_err(|_| PanelError::InvalidAccount(format!("invalid port in host `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_defaults() {
        assert_eq!(split_host_port("").unwrap(), ("127.0.0.1", 3306));
        assert_eq!(split_host_port("db.local").unwrap(), ("db.local", 3306));
        assert_eq!(split_host_port("db.local:3307").unwrap(), ("db.local", 3307));
        assert_eq!(split_host_port(":3310").unwrap(), ("127.0.0.1", 3310));
        assert!(matches!(
            split_host_port("db.local:port"),
            Err(PanelError::InvalidAccount(_))
        ));
    }

    #[test]
    fn ipv6_hosts() {
        assert_eq!(split_host_port("::1").unwrap(), ("::1", 3306));
        assert_eq!(split_host_port("fe80::2:7").unwrap(), ("fe80::2:7", 3306));
        assert_eq!(split_host_port("[::1]").unwrap(), ("::1", 3306));
        assert_eq!(split_host_port("[::1]:3307").unwrap(), ("::1", 3307));
        for bad in ["[::1", "[::1]3307", "[]:3306", "[::1]:x"] {
            assert!(
                matches!(split_host_port(bad), Err(PanelError::InvalidAccount(_))),
                "host: {bad}"
            );
        }
    }
}
