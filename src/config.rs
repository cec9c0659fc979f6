use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "vaxcard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// 10 MB. Gemini rejects inline payloads above 20 MB once base64-encoded.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 1800;

const ENV_API_KEY: &str = "GEMINI_API_KEY";
const ENV_MODEL: &str = "VAXCARD_MODEL";
const ENV_GEMINI_URL: &str = "VAXCARD_GEMINI_URL";
const ENV_BIND: &str = "VAXCARD_BIND";
const ENV_TIMEOUT: &str = "VAXCARD_TIMEOUT_SECS";
const ENV_MAX_UPLOAD: &str = "VAXCARD_MAX_UPLOAD_BYTES";
const ENV_SESSION_IDLE: &str = "VAXCARD_SESSION_IDLE_SECS";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "vaxcard_lib=info,vaxcard=info,tower_http=warn"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; the inference service cannot be reached without it")]
    MissingApiKey(&'static str),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Inference credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: ApiKey,
    pub model: String,
    pub gemini_url: String,
    pub bind_addr: SocketAddr,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub session_idle_secs: u64,
}

impl Settings {
    /// Load from the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey(ENV_API_KEY))?;

        let model = lookup(ENV_MODEL)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let gemini_url = lookup(ENV_GEMINI_URL)
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string());
        if !(gemini_url.starts_with("https://") || gemini_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                var: ENV_GEMINI_URL,
                value: gemini_url,
            });
        }

        let bind_addr: SocketAddr = parse_or(&lookup, ENV_BIND, DEFAULT_BIND_ADDR)?;
        let request_timeout_secs: u64 = parse_or(&lookup, ENV_TIMEOUT, DEFAULT_TIMEOUT_SECS)?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: ENV_TIMEOUT,
                value: "0".into(),
            });
        }
        let max_upload_bytes: usize = parse_or(&lookup, ENV_MAX_UPLOAD, DEFAULT_MAX_UPLOAD_BYTES)?;
        let session_idle_secs: u64 = parse_or(&lookup, ENV_SESSION_IDLE, DEFAULT_SESSION_IDLE_SECS)?;
        for (var, value) in [
            (ENV_MAX_UPLOAD, max_upload_bytes as u64),
            (ENV_SESSION_IDLE, session_idle_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    var,
                    value: "0".into(),
                });
            }
        }

        Ok(Self {
            api_key: ApiKey::new(api_key),
            model,
            gemini_url,
            bind_addr,
            request_timeout_secs,
            max_upload_bytes,
            session_idle_secs,
        })
    }
}

fn parse_or<F, T, D>(lookup: &F, var: &'static str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    D: fmt::Display,
{
    let raw = match lookup(var) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    };
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { var, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let settings = Settings::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k-123")])).unwrap();
        assert_eq!(settings.api_key.expose(), "k-123");
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.gemini_url, DEFAULT_GEMINI_URL);
        assert_eq!(settings.bind_addr, "127.0.0.1:8501".parse().unwrap());
        assert_eq!(settings.request_timeout_secs, 120);
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(settings.session_idle_secs, 1800);
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = Settings::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey("GEMINI_API_KEY"));
    }

    #[test]
    fn blank_key_is_treated_as_missing() {
        let err = Settings::from_lookup(lookup_from(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }

    #[test]
    fn overrides_are_honoured() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("VAXCARD_MODEL", "gemini-1.5-flash"),
            ("VAXCARD_GEMINI_URL", "http://localhost:9000/"),
            ("VAXCARD_BIND", "0.0.0.0:9090"),
            ("VAXCARD_TIMEOUT_SECS", "30"),
            ("VAXCARD_MAX_UPLOAD_BYTES", "2048"),
            ("VAXCARD_SESSION_IDLE_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(settings.model, "gemini-1.5-flash");
        assert_eq!(settings.gemini_url, "http://localhost:9000");
        assert_eq!(settings.bind_addr.port(), 9090);
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.max_upload_bytes, 2048);
        assert_eq!(settings.session_idle_secs, 60);
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("VAXCARD_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "VAXCARD_TIMEOUT_SECS",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("VAXCARD_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "VAXCARD_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn zero_limits_are_rejected() {
        for var in ["VAXCARD_MAX_UPLOAD_BYTES", "VAXCARD_SESSION_IDLE_SECS"] {
            let err = Settings::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k"), (var, "0")]))
                .unwrap_err();
            assert_eq!(err, ConfigError::InvalidValue { var, value: "0".into() });
        }
    }

    #[test]
    fn non_http_url_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("VAXCARD_GEMINI_URL", "ftp://example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "VAXCARD_GEMINI_URL", .. }));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let settings = Settings::from_lookup(lookup_from(&[("GEMINI_API_KEY", "secret-value")])).unwrap();
        let printed = format!("{settings:?}");
        assert!(!printed.contains("secret-value"));
        assert!(printed.contains("ApiKey(***)"));
    }

    #[test]
    fn app_name_is_vaxcard() {
        assert_eq!(APP_NAME, "vaxcard");
    }
}
