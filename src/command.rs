//! # Command Vocabulary
//!
//! Button payloads are short ASCII strings: a keyword, then `_`-delimited
//! arguments. They are decoded once, at the boundary, into [`CallbackCommand`].
//! Anything not in the vocabulary decodes to [`CallbackCommand::Unknown`] so
//! stale buttons from older catalog states are harmless.
//!
//! | Payload                  | Command          |
//! |--------------------------|------------------|
//! | `cmd_start`              | `RootMenu`       |
//! | `cmd_products`           | `Products`       |
//! | `cmd_search`             | `Search`         |
//! | `cmd_contact`            | `Contact`        |
//! | `cmd_help`               | `Help`           |
//! | `cmd_cart`               | `ViewCart`       |
//! | `cmd_clearcart`          | `ClearCart`      |
//! | `cmd_checkout`           | `Checkout`       |
//! | `cmd_cancel_order`       | `CancelOrder`    |
//! | `cat_<category>`         | `OpenCategory`   |
//! | `prod_<id>`              | `OpenProduct`    |
//! | `cprod_<id>`             | `OpenProduct`    |
//! | `add_<id>`               | `AddToCart`      |
//! | `remove_<id>`            | `RemoveOne`      |
//! | `order_<id>`             | `BuyNow`         |
//!
//! `cprod_<id>` marks a product opened from its category screen; the back
//! button then returns to the product's own category. Only one id ever
//! follows the keyword, so ids may contain `_`.
//!
//! Telegram rejects callback data over 64 bytes. Ids longer than
//! [`MAX_ID_BYTES`] are refused by the stores and left out of the snapshot,
//! which keeps the longest payload (`remove_<id>`) within the limit.

use std::fmt;

/// Telegram's limit on `callback_data`
pub const CALLBACK_DATA_MAX_BYTES: usize = 64;

/// Longest product or category id that fits every payload
pub const MAX_ID_BYTES: usize = 48;

/// Whether an id can travel inside a button payload
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_BYTES
}

/// A decoded button payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCommand {
    RootMenu,
    Products,
    Search,
    Contact,
    Help,
    ViewCart,
    ClearCart,
    Checkout,
    CancelOrder,
    OpenCategory(String),
    OpenProduct {
        product_id: String,
        /// Opened from the product's category screen rather than a flat listing
        from_category: bool,
    },
    AddToCart(String),
    RemoveOne(String),
    BuyNow(String),
    Unknown(String),
}

impl CallbackCommand {
    pub fn parse(data: &str) -> Self {
        let data = data.trim();
        match data {
            "cmd_start" => return CallbackCommand::RootMenu,
            "cmd_products" => return CallbackCommand::Products,
            "cmd_search" => return CallbackCommand::Search,
            "cmd_contact" => return CallbackCommand::Contact,
            "cmd_help" => return CallbackCommand::Help,
            "cmd_cart" => return CallbackCommand::ViewCart,
            "cmd_clearcart" => return CallbackCommand::ClearCart,
            "cmd_checkout" => return CallbackCommand::Checkout,
            "cmd_cancel_order" => return CallbackCommand::CancelOrder,
            _ => {}
        }

        let unknown = || CallbackCommand::Unknown(data.to_string());
        let Some((keyword, argument)) = data.split_once('_') else {
            return unknown();
        };

        match keyword {
            _ if argument.is_empty() => unknown(),
            "prod" => CallbackCommand::OpenProduct {
                product_id: argument.to_string(),
                from_category: false,
            },
            "cprod" => CallbackCommand::OpenProduct {
                product_id: argument.to_string(),
                from_category: true,
            },
            "cat" => CallbackCommand::OpenCategory(argument.to_string()),
            "add" => CallbackCommand::AddToCart(argument.to_string()),
            "remove" => CallbackCommand::RemoveOne(argument.to_string()),
            "order" => CallbackCommand::BuyNow(argument.to_string()),
            _ => unknown(),
        }
    }
}

impl fmt::Display for CallbackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackCommand::RootMenu => f.write_str("cmd_start"),
            CallbackCommand::Products => f.write_str("cmd_products"),
            CallbackCommand::Search => f.write_str("cmd_search"),
            CallbackCommand::Contact => f.write_str("cmd_contact"),
            CallbackCommand::Help => f.write_str("cmd_help"),
            CallbackCommand::ViewCart => f.write_str("cmd_cart"),
            CallbackCommand::ClearCart => f.write_str("cmd_clearcart"),
            CallbackCommand::Checkout => f.write_str("cmd_checkout"),
            CallbackCommand::CancelOrder => f.write_str("cmd_cancel_order"),
            CallbackCommand::OpenCategory(id) => write!(f, "cat_{id}"),
            CallbackCommand::OpenProduct {
                product_id,
                from_category: false,
            } => write!(f, "prod_{product_id}"),
            CallbackCommand::OpenProduct {
                product_id,
                from_category: true,
            } => write!(f, "cprod_{product_id}"),
            CallbackCommand::AddToCart(id) => write!(f, "add_{id}"),
            CallbackCommand::RemoveOne(id) => write!(f, "remove_{id}"),
            CallbackCommand::BuyNow(id) => write!(f, "order_{id}"),
            CallbackCommand::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// A text message classified against the slash-command vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    Start,
    Help,
    Products,
    Contact,
    Search,
    Cart,
    Cancel,
    /// A `/command` outside the vocabulary
    UnknownCommand(String),
    /// Anything else; used as a catalog search when no wizard is open
    FreeText(String),
}

impl TextCommand {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some(command) = text.strip_prefix('/') else {
            return TextCommand::FreeText(text.to_string());
        };

        // `/start@shop_bot payload` -> `start`
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();

        match name.as_str() {
            "start" => TextCommand::Start,
            "help" => TextCommand::Help,
            "products" => TextCommand::Products,
            "contact" => TextCommand::Contact,
            "search" => TextCommand::Search,
            "cart" => TextCommand::Cart,
            "cancel" => TextCommand::Cancel,
            _ => TextCommand::UnknownCommand(name),
        }
    }
}

/// Whether a text tears down an open wizard: `/start`, `/cancel`, the word
/// `cancel` or the localized label of the cancel button
pub fn is_cancel_keyword(text: &str, cancel_label: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("cancel") || text == cancel_label.trim() {
        return true;
    }
    matches!(TextCommand::parse(text), TextCommand::Start | TextCommand::Cancel)
}
