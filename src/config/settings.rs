//! Application settings loaded from config.toml
//!
//! Every section is optional; missing sections and keys fall back to defaults.
//! The gateway server key is a secret and is only ever read from the
//! `MIDTRANS_SERVER_KEY` environment variable.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const SERVER_KEY_ENV: &str = "MIDTRANS_SERVER_KEY";

/// Shortest and longest accepted redemption code windows, in seconds.
const CODE_WINDOW_BOUNDS: (i64, i64) = (60, 1800);

/// Top-level configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Checkout behaviour
    #[serde(default)]
    pub fulfillment: FulfillmentSettings,
    /// Redemption code rotation
    #[serde(default)]
    pub ticket_code: TicketCodeSettings,
    /// Payment gateway connection
    #[serde(default)]
    pub gateway: GatewaySettings,
}

/// Checkout behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentSettings {
    /// How long the code of a freshly issued (pending) ticket is served
    #[serde(default = "default_pending_ticket_ttl_secs")]
    pub pending_ticket_ttl_secs: i64,
}

/// Redemption code rotation
#[derive(Debug, Clone, Deserialize)]
pub struct TicketCodeSettings {
    /// Lifetime of a regenerated code
    #[serde(default = "default_code_window_secs")]
    pub window_secs: i64,
}

/// Payment gateway connection
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Gateway API root
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    /// Upper bound on a single gateway call
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    /// Reject notifications whose signature does not match the server key
    #[serde(default = "default_true")]
    pub verify_signatures: bool,
    /// Merchant server key, from the environment only
    #[serde(skip)]
    pub server_key: Option<String>,
}

const fn default_pending_ticket_ttl_secs() -> i64 {
    60
}

const fn default_code_window_secs() -> i64 {
    180
}

fn default_gateway_base_url() -> String {
    "https://app.sandbox.midtrans.com".to_string()
}

const fn default_gateway_timeout_secs() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            pending_ticket_ttl_secs: default_pending_ticket_ttl_secs(),
        }
    }
}

impl Default for TicketCodeSettings {
    fn default() -> Self {
        Self {
            window_secs: default_code_window_secs(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            timeout_secs: default_gateway_timeout_secs(),
            verify_signatures: default_true(),
            server_key: None,
        }
    }
}

impl FulfillmentSettings {
    /// Validity of a pending ticket's first code.
    #[must_use]
    pub fn pending_ticket_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pending_ticket_ttl_secs)
    }
}

impl TicketCodeSettings {
    /// Validity of a regenerated code.
    #[must_use]
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs)
    }
}

impl GatewaySettings {
    /// Server key to verify notifications with, if verification is on and a key is set.
    #[must_use]
    pub fn verification_key(&self) -> Option<&str> {
        if self.verify_signatures {
            self.server_key.as_deref()
        } else {
            None
        }
    }
}

impl Settings {
    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first out-of-range value.
    pub fn validate(&self) -> Result<()> {
        if self.fulfillment.pending_ticket_ttl_secs <= 0 {
            return Err(Error::Config {
                message: "fulfillment.pending_ticket_ttl_secs must be positive".to_string(),
            });
        }

        let (min, max) = CODE_WINDOW_BOUNDS;
        if !(min..=max).contains(&self.ticket_code.window_secs) {
            return Err(Error::Config {
                message: format!("ticket_code.window_secs must be between {min} and {max}"),
            });
        }

        if self.gateway.timeout_secs == 0 {
            return Err(Error::Config {
                message: "gateway.timeout_secs must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Fills secrets from the environment.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.gateway.server_key = std::env::var(SERVER_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        self
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from `./config.toml` if present, otherwise defaults, then applies
/// environment secrets.
///
/// # Errors
/// Returns an error if the file exists but cannot be read, parsed, or validated.
pub fn load_default_config() -> Result<Settings> {
    let settings = if Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_config(DEFAULT_CONFIG_PATH)?
    } else {
        tracing::info!("No {DEFAULT_CONFIG_PATH} found, using default settings");
        Settings::default()
    };
    Ok(settings.with_env())
}
