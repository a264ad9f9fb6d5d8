//! # Storefront Data Model
//!
//! Records shared between the conversational core and the external stores.
//!
//! ## Core Concepts
//!
//! - **Product** / **Category**: read-only catalog records, refreshed every poll cycle
//! - **VerifiedContact**: a chat identity tied to a device-verified phone number
//! - **Order**: a finalized purchase; item prices are frozen when it is built
//!
//! ```rust
//! use teleshop::model::{format_price, normalize_phone};
//!
//! assert_eq!(format_price(3_500_000), "3,500,000");
//! assert_eq!(normalize_phone("+98 912 111 1111", "98"), "09121111111");
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ShopError;

/// Stable identifier of a conversation participant
pub type CustomerId = i64;

/// A product as listed in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// Short human-facing code, searchable alongside the name
    pub code: String,
    pub name: String,
    /// Unit price in the store currency (no minor units)
    pub price: i64,
    /// Number of items in one pack
    pub pack_size: u32,
    /// Owning category id, empty when uncategorized
    pub category_id: String,
    pub description: String,
    /// `data:` URI, http(s) URL, or empty
    pub image_ref: String,
    pub created_at: DateTime<Utc>,
}

/// A grouping used only for navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Image payload ready for upload
#[derive(Debug, Clone, PartialEq)]
pub enum ProductImage {
    Bytes(Vec<u8>),
    Url(url::Url),
}

impl Product {
    /// Case-insensitive substring match against name or code
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        self.name.to_lowercase().contains(needle_lowercase)
            || self.code.to_lowercase().contains(needle_lowercase)
    }

    /// Resolve the image reference into something the transport can send.
    ///
    /// Returns `Ok(None)` when the product has no usable image.
    pub fn image(&self) -> Result<Option<ProductImage>, ShopError> {
        let reference = self.image_ref.trim();
        if let Some(rest) = reference.strip_prefix("data:") {
            let (_, payload) = rest
                .split_once(',')
                .ok_or_else(|| ShopError::InvalidImage(format!("product {}: no payload", self.id)))?;
            let bytes = BASE64
                .decode(payload.trim())
                .map_err(|e| ShopError::InvalidImage(format!("product {}: {e}", self.id)))?;
            return Ok(Some(ProductImage::Bytes(bytes)));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = url::Url::parse(reference)
                .map_err(|e| ShopError::InvalidImage(format!("product {}: {e}", self.id)))?;
            return Ok(Some(ProductImage::Url(url)));
        }
        Ok(None)
    }
}

/// A chat identity whose phone number was shared from the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedContact {
    pub customer_id: CustomerId,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// Lifecycle of an order in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Localization key of the customer-facing label
    pub fn label_key(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "status-pending",
            OrderStatus::Processing => "status-processing",
            OrderStatus::Completed => "status-completed",
            OrderStatus::Cancelled => "status-cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(ShopError::CorruptRecord(format!("unknown order status {other}"))),
        }
    }
}

/// One ordered product with its price frozen at order time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub price_at_time: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.price_at_time * i64::from(self.quantity)
    }
}

/// A finalized order as written to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub items: Vec<OrderItem>,
    pub shipping_method: Option<String>,
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Short order id derived from the clock: `ORD-` and the last six millisecond digits
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    format!("ORD-{:06}", now.timestamp_millis().rem_euclid(1_000_000))
}

/// Format an amount with thousands separators
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

lazy_static! {
    static ref PHONE_NOISE: Regex = Regex::new(r"[\s\-().]").expect("phone noise pattern should be valid");
}

/// Normalize a phone number to local format so `+98912...`, `0098912...`,
/// `98912...` and `0912...` compare equal for the given country code.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let compact = PHONE_NOISE.replace_all(raw.trim(), "").to_string();
    let international = [format!("+{country_code}"), format!("00{country_code}")];
    for prefix in &international {
        if let Some(rest) = compact.strip_prefix(prefix.as_str()) {
            return format!("0{rest}");
        }
    }
    if let Some(rest) = compact.strip_prefix(country_code) {
        if !country_code.is_empty() && rest.len() == 10 && rest.chars().all(|c| c.is_ascii_digit()) {
            return format!("0{rest}");
        }
    }
    compact
}

/// Whether two phone numbers denote the same line
pub fn phones_match(a: &str, b: &str, country_code: &str) -> bool {
    let a = normalize_phone(a, country_code);
    !a.is_empty() && a == normalize_phone(b, country_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(image_ref: &str) -> Product {
        Product {
            id: "p1".to_string(),
            code: "SH-100".to_string(),
            name: "Sony Headphone".to_string(),
            price: 3_500_000,
            pack_size: 1,
            category_id: "c1".to_string(),
            description: "Wireless".to_string(),
            image_ref: image_ref.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0), "0");
        assert_eq!(format_price(999), "999");
        assert_eq!(format_price(1000), "1,000");
        assert_eq!(format_price(3_500_000), "3,500,000");
        assert_eq!(format_price(-12_345), "-12,345");
    }

    #[test]
    fn test_normalize_phone_variants() {
        assert_eq!(normalize_phone("+989121111111", "98"), "09121111111");
        assert_eq!(normalize_phone("00989121111111", "98"), "09121111111");
        assert_eq!(normalize_phone("989121111111", "98"), "09121111111");
        assert_eq!(normalize_phone("0912-111-1111", "98"), "09121111111");
        assert!(phones_match("+98 912 111 1111", "09121111111", "98"));
        assert!(!phones_match("09121111111", "09122222222", "98"));
        assert!(!phones_match("", "", "98"));
    }

    #[test]
    fn test_product_matching_is_case_insensitive() {
        let p = product("");
        assert!(p.matches("sony"));
        assert!(p.matches("sh-1"));
        assert!(!p.matches("bose"));
    }

    #[test]
    fn test_product_image_resolution() {
        assert_eq!(product("").image().unwrap(), None);
        assert_eq!(product("/local/path.jpg").image().unwrap(), None);

        match product("data:image/jpeg;base64,aGVsbG8=").image().unwrap() {
            Some(ProductImage::Bytes(bytes)) => assert_eq!(bytes, b"hello"),
            other => panic!("unexpected image {other:?}"),
        }
        assert!(matches!(
            product("https://cdn.example.com/p1.jpg").image().unwrap(),
            Some(ProductImage::Url(_))
        ));
        assert!(product("data:image/jpeg;base64,@@@").image().is_err());
    }

    #[test]
    fn test_order_status_round_trip_strings() {
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert_eq!(OrderStatus::Cancelled.to_string(), "CANCELLED");
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
    }

    #[test]
    fn test_generate_order_id_is_short() {
        let now = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        assert_eq!(generate_order_id(now), "ORD-123456");
    }
}
