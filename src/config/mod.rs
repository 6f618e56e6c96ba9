use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    /// 未设置时使用进程内缓存
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_ms: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_sweep_secs: u64,
    pub rate_limit_max_keys: usize,
    /// 是否按代理头识别客户端
    pub rate_limit_trust_proxy: bool,
    pub cache_ttl_secs: u64,
    pub chaos_cache_probability: f64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub seed_admin_email: Option<String>,
    pub seed_admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            redis_url: optional("REDIS_URL"),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration_secs(optional("JWT_EXPIRATION"))?,
            rate_limit_window_ms: parse_or("RATE_LIMIT_WINDOW_MS", 60_000)?,
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 10)?,
            rate_limit_sweep_secs: parse_or("RATE_LIMIT_SWEEP_SECS", 60)?,
            rate_limit_max_keys: parse_or("RATE_LIMIT_MAX_KEYS", 100_000)?,
            rate_limit_trust_proxy: parse_or("RATE_LIMIT_TRUST_PROXY", false)?,
            cache_ttl_secs: parse_or("CACHE_TTL", 300)?,
            chaos_cache_probability: parse_or("CHAOS_CACHE_PROBABILITY", 0.0)?,
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 3000)?,
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            seed_admin_email: optional("SEED_ADMIN_EMAIL"),
            seed_admin_password: optional("SEED_ADMIN_PASSWORD"),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs.max(1))
    }
}

/// `JWT_EXPIRATION` 以小时计，可带 `h` 后缀，默认 24 小时
fn jwt_expiration_secs(raw: Option<String>) -> Result<u64, ConfigError> {
    const NAME: &str = "JWT_EXPIRATION";
    let Some(raw) = raw else {
        return Ok(24 * 3600);
    };
    let hours: u64 = parse_value(NAME, raw.trim().trim_end_matches('h'))?;
    hours
        .checked_mul(3600)
        .filter(|secs| i64::try_from(*secs).is_ok())
        .ok_or(ConfigError::Invalid {
            name: NAME,
            value: raw,
        })
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/starter_test".into(),
        redis_url: None,
        jwt_secret: "test_secret".into(),
        jwt_expiration_secs: 3600,
        rate_limit_window_ms: 60_000,
        rate_limit_requests: 10,
        rate_limit_sweep_secs: 60,
        rate_limit_max_keys: 1_000,
        rate_limit_trust_proxy: false,
        cache_ttl_secs: 300,
        chaos_cache_probability: 0.0,
        server_host: "127.0.0.1".into(),
        server_port: 3000,
        api_base_uri: "/api".into(),
        seed_admin_email: None,
        seed_admin_password: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value::<u32>("RATE_LIMIT_REQUESTS", "ten").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RATE_LIMIT_REQUESTS", .. }));
    }

    #[test]
    fn test_parse_value_trims() {
        let v: u64 = parse_value("CACHE_TTL", " 120 ").unwrap();
        assert_eq!(v, 120);
    }

    #[test]
    fn test_jwt_expiration_parsing() {
        assert_eq!(jwt_expiration_secs(None).unwrap(), 86_400);
        assert_eq!(jwt_expiration_secs(Some("2h".into())).unwrap(), 7_200);
        assert_eq!(jwt_expiration_secs(Some("1".into())).unwrap(), 3_600);
    }

    #[test]
    fn test_jwt_expiration_overflow_is_invalid() {
        let err = jwt_expiration_secs(Some("6000000000000000h".into())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "JWT_EXPIRATION", .. }));

        // 超出 i64 的秒数无法写入令牌
        let err = jwt_expiration_secs(Some("3000000000000000h".into())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_window_helpers() {
        let config = test_config();
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.jwt_expiration(), Duration::from_secs(3600));
    }
}
