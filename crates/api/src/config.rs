use crate::auth::jwt::JwtConfig;
use skinscan_core::entitlement::DEFAULT_FREE_SCAN_ALLOWANCE;
use skinscan_core::signature::DEFAULT_TOLERANCE_SECS;

/// Server configuration loaded from environment variables.
///
/// Defaults suit local development; production overrides via environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// `json` switches the log formatter to JSON lines.
    pub log_format: LogFormat,
    /// Identity token verification.
    pub jwt: JwtConfig,
    pub oracle: OracleConfig,
    pub billing: BillingConfig,
    pub scans: ScanPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where and how long to wait for the scoring oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// Payment webhook verification settings.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Endpoint signing secret. Without it, webhooks are rejected unless
    /// `allow_unsigned` is set.
    pub webhook_secret: Option<String>,
    /// Development-only escape hatch for unsigned events.
    pub allow_unsigned: bool,
    pub signature_tolerance_secs: i64,
}

/// Free-tier scan limits and upload size.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Free scans restored each time the cooldown window rolls over.
    pub free_scan_allowance: i32,
    pub max_image_bytes: usize,
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 25;
const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                 |
    /// |------------------------------------|-------------------------|
    /// | `HOST`                             | `0.0.0.0`               |
    /// | `PORT`                             | `3000`                  |
    /// | `CORS_ORIGINS`                     | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`             | `30`                    |
    /// | `LOG_FORMAT`                       | `text`                  |
    /// | `ORACLE_URL`                       | **required**            |
    /// | `ORACLE_TIMEOUT_SECS`              | `25`                    |
    /// | `MAX_IMAGE_BYTES`                  | `10485760`              |
    /// | `FREE_SCAN_ALLOWANCE`              | `1`                     |
    /// | `BILLING_WEBHOOK_SECRET`           | unset                   |
    /// | `BILLING_ALLOW_UNSIGNED`           | `false`                 |
    /// | `BILLING_SIGNATURE_TOLERANCE_SECS` | `300`                   |
    ///
    /// JWT settings are read by [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on a missing required variable, an unparsable value, or an
    /// oracle timeout that is not shorter than the request timeout.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let oracle = OracleConfig {
            url: std::env::var("ORACLE_URL").expect("ORACLE_URL must be set in the environment"),
            timeout_secs: std::env::var("ORACLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_ORACLE_TIMEOUT_SECS.to_string())
                .parse()
                .expect("ORACLE_TIMEOUT_SECS must be a valid u64"),
        };

        if let Err(msg) = check_timeouts(request_timeout_secs, oracle.timeout_secs) {
            panic!("{msg}");
        }

        let webhook_secret = std::env::var("BILLING_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let billing = BillingConfig {
            webhook_secret,
            allow_unsigned: std::env::var("BILLING_ALLOW_UNSIGNED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            signature_tolerance_secs: std::env::var("BILLING_SIGNATURE_TOLERANCE_SECS")
                .unwrap_or_else(|_| DEFAULT_TOLERANCE_SECS.to_string())
                .parse()
                .expect("BILLING_SIGNATURE_TOLERANCE_SECS must be a valid i64"),
        };

        let free_scan_allowance: i32 = std::env::var("FREE_SCAN_ALLOWANCE")
            .unwrap_or_else(|_| DEFAULT_FREE_SCAN_ALLOWANCE.to_string())
            .parse()
            .expect("FREE_SCAN_ALLOWANCE must be a valid i32");
        assert!(free_scan_allowance >= 0, "FREE_SCAN_ALLOWANCE must not be negative");

        let scans = ScanPolicy {
            free_scan_allowance,
            max_image_bytes: std::env::var("MAX_IMAGE_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_IMAGE_BYTES.to_string())
                .parse()
                .expect("MAX_IMAGE_BYTES must be a valid usize"),
        };

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            log_format,
            jwt,
            oracle,
            billing,
            scans,
        }
    }
}

/// The oracle call must give up before the outer request timeout, or the
/// client gets a bare 408 instead of a JSON upstream error.
fn check_timeouts(request_timeout_secs: u64, oracle_timeout_secs: u64) -> Result<(), String> {
    if oracle_timeout_secs >= request_timeout_secs {
        return Err(format!(
            "ORACLE_TIMEOUT_SECS ({oracle_timeout_secs}) must be shorter than \
             REQUEST_TIMEOUT_SECS ({request_timeout_secs})"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_oracle_timeout_fits_inside_request_timeout() {
        assert_eq!(
            check_timeouts(DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ORACLE_TIMEOUT_SECS),
            Ok(())
        );
    }

    #[test]
    fn oracle_timeout_must_be_shorter() {
        assert!(check_timeouts(30, 30).is_err());
        assert!(check_timeouts(30, 60).is_err());
        assert!(check_timeouts(30, 29).is_ok());
    }
}
