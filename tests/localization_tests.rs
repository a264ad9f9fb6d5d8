//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval, language fallback and argument formatting.

use std::collections::HashMap;
use teleshop::localization::{detect_language, t_args_lang, t_lang, LocalizationManager};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-text", "en", None);
        assert!(message.contains("/products"));
        assert!(message.contains("/cancel"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("cart-empty", "de", None);
        // Should fall back to English
        assert_eq!(message, manager.get_message_in_language("cart-empty", "en", None));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("order_id", "ORD-123456");
        args.insert("status", "Processing");

        let message = manager.get_message_in_language("status-changed", "en", Some(&args));
        assert!(message.contains("ORD-123456"));
        assert!(message.contains("Processing"));
    }

    #[test]
    fn test_persian_differs_from_english() {
        let manager = setup_localization();

        let en = manager.get_message_in_language("order-ask-name", "en", None);
        let fa = manager.get_message_in_language("order-ask-name", "fa", None);
        assert!(!fa.is_empty());
        assert_ne!(en, fa);
    }

    #[test]
    fn test_detect_language_from_client_codes() {
        assert_eq!(detect_language(Some("fa-IR")), "fa");
        assert_eq!(detect_language(Some("FA")), "fa");
        assert_eq!(detect_language(Some("en_US")), "en");
        assert_eq!(detect_language(Some("de")), "en");
        assert_eq!(detect_language(None), "en");
    }

    #[test]
    fn test_global_helpers() {
        let price = t_args_lang("price-amount", &[("amount", "90,000")], Some("en-GB"));
        assert_eq!(price, "90,000 Toman");

        let label = t_lang("button-cancel-order", Some("fa"));
        assert_ne!(label, t_lang("button-cancel-order", None));
    }
}
