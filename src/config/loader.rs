use std::{env, time::Duration};

use url::Url;

use super::env::{ApiConfig, AppConfig, ConfigError, DirectoryConfig, LoggingConfig};

pub const DEFAULT_API_BASE_URL: &str = "https://studiva.site/api";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_base = env::var("API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let api = ApiConfig {
            base_url: parse_base_url(&raw_base)?,
            request_timeout: Duration::from_millis(
                parse_u64("REQUEST_TIMEOUT_MS")?.unwrap_or(60_000),
            ),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "studiva.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone =
            env::var("DISPLAY_TIMEZONE").unwrap_or_else(|_| "Asia/Jakarta".to_string());
        if timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid {
                key: "DISPLAY_TIMEZONE",
                value: timezone,
            });
        }

        Ok(Self {
            api,
            directories,
            logging,
            timezone,
        })
    }
}

/// Endpoints are joined relative to the base, so it must end with a slash.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    match Url::parse(&normalized) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(ConfigError::Invalid {
            key: "API_BASE_URL",
            value: raw.to_string(),
        }),
    }
}

fn parse_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("https://studiva.site/api").unwrap();
        assert_eq!(url.as_str(), "https://studiva.site/api/");
        assert_eq!(
            url.join("calculate").unwrap().as_str(),
            "https://studiva.site/api/calculate"
        );
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://studiva.site").is_err());
        assert!(parse_base_url("not a url").is_err());
    }
}
