use std::{net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Context};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub cors_origin: Option<String>,
    /// `APP_HOST:APP_PORT`, defaulting to `0.0.0.0:8080`.
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };

        let jwt = JwtConfig {
            access_secret: required("ACCESS_TOKEN_SECRET")?,
            access_ttl: parse_duration(&required("ACCESS_TOKEN_EXPIRY")?)
                .context("ACCESS_TOKEN_EXPIRY")?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            refresh_ttl: parse_duration(&required("REFRESH_TOKEN_EXPIRY")?)
                .context("REFRESH_TOKEN_EXPIRY")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "dietanalyzer".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "dietanalyzer-users".into()),
        };

        if jwt.access_secret == jwt.refresh_secret {
            tracing::warn!("access and refresh tokens share a signing secret");
        }

        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("APP_PORT").unwrap_or_else(|| "8080".into());
        let bind_addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid APP_HOST/APP_PORT {host:?}:{port:?}"))?;

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            jwt,
            cors_origin: var("CORS_ORIGIN").filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Longest accepted token lifetime.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Parses `"900"`, `"45s"`, `"15m"`, `"1h"` or `"10d"`, up to [`MAX_TOKEN_TTL`].
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    let scale: u64 = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => bail!("unknown duration unit {other:?} in {raw:?}"),
    };
    let secs = value
        .checked_mul(scale)
        .filter(|secs| *secs <= MAX_TOKEN_TTL.as_secs())
        .ok_or_else(|| anyhow!("duration {raw:?} exceeds {}d", MAX_TOKEN_TTL.as_secs() / 86_400))?;
    if secs == 0 {
        bail!("duration {raw:?} must be positive");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full() -> HashMap<String, String> {
        vars(&[
            ("ACCESS_TOKEN_SECRET", "access"),
            ("ACCESS_TOKEN_EXPIRY", "15m"),
            ("REFRESH_TOKEN_SECRET", "refresh"),
            ("REFRESH_TOKEN_EXPIRY", "10d"),
        ])
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("900").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 10d ").unwrap(), Duration::from_secs(864_000));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("-5m").is_err());
    }

    #[test]
    fn rejects_overflowing_and_oversized_durations() {
        assert_eq!(parse_duration("365d").unwrap(), MAX_TOKEN_TTL);
        assert!(parse_duration("366d").is_err());
        assert!(parse_duration("9999999999999d").is_err());
        assert!(parse_duration("300000000000000000d").is_err());
        assert!(parse_duration("99999999999999999999").is_err());

        let mut env = full();
        env.insert("REFRESH_TOKEN_EXPIRY".into(), "9999999999999d".into());
        let err = AppConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("REFRESH_TOKEN_EXPIRY"), "{err}");
    }

    #[test]
    fn loads_full_config_with_defaults() {
        let env = full();
        let cfg = AppConfig::from_vars(|k| env.get(k).cloned()).expect("config");
        assert_eq!(cfg.jwt.access_ttl, Duration::from_secs(900));
        assert_eq!(cfg.jwt.refresh_ttl, Duration::from_secs(864_000));
        assert_eq!(cfg.jwt.issuer, "dietanalyzer");
        assert_eq!(cfg.jwt.audience, "dietanalyzer-users");
        assert!(cfg.database_url.is_none());
        assert!(cfg.cors_origin.is_none());
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bind_address_comes_from_host_and_port() {
        let mut env = full();
        env.insert("APP_HOST".into(), "127.0.0.1".into());
        env.insert("APP_PORT".into(), "3000".into());
        let cfg = AppConfig::from_vars(|k| env.get(k).cloned()).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());

        env.insert("APP_PORT".into(), "not-a-port".into());
        let err = AppConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"), "{err}");
    }

    #[test]
    fn secrets_and_expiries_are_required() {
        for missing in [
            "ACCESS_TOKEN_SECRET",
            "ACCESS_TOKEN_EXPIRY",
            "REFRESH_TOKEN_SECRET",
            "REFRESH_TOKEN_EXPIRY",
        ] {
            let mut env = full();
            env.remove(missing);
            let err = AppConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
            assert!(err.to_string().contains(missing), "{err}");
        }
    }

    #[test]
    fn blank_database_url_means_memory_store() {
        let mut env = full();
        env.insert("DATABASE_URL".into(), "  ".into());
        let cfg = AppConfig::from_vars(|k| env.get(k).cloned()).unwrap();
        assert!(cfg.database_url.is_none());
    }
}
