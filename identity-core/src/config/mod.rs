use serde::Deserialize;
use std::env;

use crate::services::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub permission_cache: PermissionCacheConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Budget for any single ephemeral-store call; a timeout is handled the
    /// same way as a backend error (fail open / fail policy).
    pub store_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionCacheConfig {
    /// Secondary TTL capping how long a missed invalidation can linger.
    pub ttl_seconds: i64,
}

/// Ceiling and window for one rate category.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitRule {
    pub ceiling: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub general: RateLimitRule,
    pub authentication: RateLimitRule,
    pub registration: RateLimitRule,
    pub credential_reset: RateLimitRule,
    /// Identities (network addresses or API keys) that bypass counting.
    pub allowlist: Vec<String>,
    /// Counter-store failure policy: admit (true) or refuse (false).
    pub fail_open: bool,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| ServiceError::Config(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = IdentityConfig {
            environment,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
                store_timeout_ms: parse_env("REDIS_STORE_TIMEOUT_MS", "500", is_prod)?,
            },
            jwt: JwtConfig {
                private_key_path: get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?,
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
            },
            session: SessionConfig {
                expiry_days: parse_env("SESSION_EXPIRY_DAYS", "7", is_prod)?,
            },
            permission_cache: PermissionCacheConfig {
                ttl_seconds: parse_env("PERMISSION_CACHE_TTL_SECONDS", "300", is_prod)?,
            },
            rate_limit: RateLimitConfig {
                general: RateLimitRule {
                    ceiling: parse_env("RATE_LIMIT_GENERAL_CEILING", "100", is_prod)?,
                    window_seconds: parse_env("RATE_LIMIT_GENERAL_WINDOW_SECONDS", "60", is_prod)?,
                },
                authentication: RateLimitRule {
                    ceiling: parse_env("RATE_LIMIT_AUTH_CEILING", "10", is_prod)?,
                    window_seconds: parse_env("RATE_LIMIT_AUTH_WINDOW_SECONDS", "60", is_prod)?,
                },
                registration: RateLimitRule {
                    ceiling: parse_env("RATE_LIMIT_REGISTER_CEILING", "3", is_prod)?,
                    window_seconds: parse_env(
                        "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                        "3600",
                        is_prod,
                    )?,
                },
                credential_reset: RateLimitRule {
                    ceiling: parse_env("RATE_LIMIT_RESET_CEILING", "3", is_prod)?,
                    window_seconds: parse_env("RATE_LIMIT_RESET_WINDOW_SECONDS", "3600", is_prod)?,
                },
                allowlist: get_env("RATE_LIMIT_ALLOWLIST", Some(""), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                fail_open: get_env("RATE_LIMIT_FAIL_OPEN", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(ServiceError::Config(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.session.expiry_days <= 0 {
            return Err(ServiceError::Config(anyhow::anyhow!(
                "SESSION_EXPIRY_DAYS must be positive"
            )));
        }

        if self.permission_cache.ttl_seconds <= 0 {
            return Err(ServiceError::Config(anyhow::anyhow!(
                "PERMISSION_CACHE_TTL_SECONDS must be positive"
            )));
        }

        for (name, rule) in [
            ("general", &self.rate_limit.general),
            ("authentication", &self.rate_limit.authentication),
            ("registration", &self.rate_limit.registration),
            ("credential-reset", &self.rate_limit.credential_reset),
        ] {
            if rule.ceiling == 0 || rule.window_seconds == 0 {
                return Err(ServiceError::Config(anyhow::anyhow!(
                    "rate limit rule '{}' needs a non-zero ceiling and window",
                    name
                )));
            }
        }

        if self.environment == Environment::Prod && !self.rate_limit.fail_open {
            tracing::warn!(
                "rate limiter configured fail-closed; a counter-store outage will refuse traffic"
            );
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, ServiceError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(ServiceError::Config(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(ServiceError::Config(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str, is_prod: bool) -> Result<T, ServiceError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| ServiceError::Config(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> IdentityConfig {
        IdentityConfig {
            environment: Environment::Dev,
            database: DatabaseConfig {
                url: "postgres://localhost/identity".into(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost".into(),
                store_timeout_ms: 500,
            },
            jwt: JwtConfig {
                private_key_path: "/keys/private.pem".into(),
                public_key_path: "/keys/public.pem".into(),
                access_token_expiry_minutes: 15,
            },
            session: SessionConfig { expiry_days: 7 },
            permission_cache: PermissionCacheConfig { ttl_seconds: 300 },
            rate_limit: RateLimitConfig {
                general: RateLimitRule {
                    ceiling: 100,
                    window_seconds: 60,
                },
                authentication: RateLimitRule {
                    ceiling: 10,
                    window_seconds: 60,
                },
                registration: RateLimitRule {
                    ceiling: 3,
                    window_seconds: 3600,
                },
                credential_reset: RateLimitRule {
                    ceiling: 3,
                    window_seconds: 3600,
                },
                allowlist: vec![],
                fail_open: true,
            },
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = sample_config();
        config.rate_limit.authentication.window_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_token_expiry_is_rejected() {
        let mut config = sample_config();
        config.jwt.access_token_expiry_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
