//! # Configuration Module
//!
//! This module defines configuration structures for the storefront bot,
//! including polling cadence, transport recovery settings and the optional
//! payment, checkout and shipping capabilities.

use std::env;
use std::time::Duration;

use crate::errors::ShopError;
use crate::localization::SUPPORTED_LANGUAGES;

// Constants for bot configuration
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_FETCH_LIMIT: u8 = 50;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_PAYMENT_BASE_URL: &str = "https://example.com/pay";
pub const DEFAULT_PHONE_COUNTRY_CODE: &str = "98";
pub const DEFAULT_CUSTOMER_LANGUAGE: &str = "fa";
pub const INLINE_RESULT_LIMIT: usize = 20;
pub const SEARCH_RESULT_LIMIT: usize = 10;
pub const CATEGORY_PRODUCT_LIMIT: usize = 20;

/// Recovery configuration for transport error handling
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Consecutive fetch failures before the circuit opens
    pub circuit_breaker_threshold: u32,
    /// Seconds the circuit stays open before polling resumes
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            base_retry_delay_ms: 1000,  // 1 second
            max_retry_delay_ms: 30_000, // 30 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Flat shipping charge added to every order
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingConfig {
    pub method: String,
    pub cost: i64,
}

/// Settings the conversational core needs while dispatching
#[derive(Debug, Clone)]
pub struct ShopSettings {
    /// Payment provider key; when set, confirmations carry a payment link
    pub payment_api_key: Option<String>,
    /// Base URL of the payment page
    pub payment_base_url: String,
    /// Base URL of the web checkout; when set, the cart offers a checkout link
    pub checkout_base_url: Option<String>,
    /// Custom text for the contact command
    pub contact_message: Option<String>,
    pub shipping: Option<ShippingConfig>,
    /// Country calling code used to match `+98...` against `0...` phone numbers
    pub phone_country_code: String,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            payment_api_key: None,
            payment_base_url: DEFAULT_PAYMENT_BASE_URL.to_string(),
            checkout_base_url: None,
            contact_message: None,
            shipping: None,
            phone_country_code: DEFAULT_PHONE_COUNTRY_CODE.to_string(),
        }
    }
}

/// Configuration structure for the whole service
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub database_url: String,
    /// Delay between poll ticks
    pub poll_interval: Duration,
    /// Maximum number of updates requested per tick
    pub fetch_limit: u8,
    /// Idle time after which an open order wizard is dropped (`None` keeps it forever)
    pub session_ttl: Option<Duration>,
    /// Reply language for clients that report none or an unsupported one,
    /// and for status notifications
    pub default_language: String,
    pub shop: ShopSettings,
    pub recovery: RecoveryConfig,
}

impl BotConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self, ShopError> {
        let bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let database_url = required("DATABASE_URL")?;

        let poll_interval =
            Duration::from_secs(parse_or("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?);
        let fetch_limit = parse_or("FETCH_LIMIT", DEFAULT_FETCH_LIMIT)?.clamp(1, 100);
        let session_ttl = match parse_or("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let default_language = parse_language(
            optional("DEFAULT_LANGUAGE").as_deref(),
        )?;

        let shipping = match optional("SHIPPING_METHOD") {
            Some(method) => Some(ShippingConfig {
                method,
                cost: parse_or("SHIPPING_COST", 0i64)?,
            }),
            None => None,
        };

        let shop = ShopSettings {
            payment_api_key: optional("PAYMENT_API_KEY"),
            payment_base_url: optional("PAYMENT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PAYMENT_BASE_URL.to_string()),
            checkout_base_url: optional("CHECKOUT_BASE_URL"),
            contact_message: optional("CONTACT_MESSAGE"),
            shipping,
            phone_country_code: optional("PHONE_COUNTRY_CODE")
                .unwrap_or_else(|| DEFAULT_PHONE_COUNTRY_CODE.to_string()),
        };

        Ok(Self {
            bot_token,
            database_url,
            poll_interval,
            fetch_limit,
            session_ttl,
            default_language,
            shop,
            recovery: RecoveryConfig::default(),
        })
    }
}

fn parse_language(raw: Option<&str>) -> Result<String, ShopError> {
    let language = raw
        .map(|code| code.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_CUSTOMER_LANGUAGE.to_string());
    if SUPPORTED_LANGUAGES.contains(&language.as_str()) {
        Ok(language)
    } else {
        Err(ShopError::Config(format!(
            "DEFAULT_LANGUAGE must be one of {}: {language}",
            SUPPORTED_LANGUAGES.join(", ")
        )))
    }
}

fn required(key: &str) -> Result<String, ShopError> {
    optional(key).ok_or_else(|| ShopError::Config(format!("{key} must be set")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ShopError> {
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ShopError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
