//! Localization for customer-facing bot text.
//!
//! Messages live in `locales/<lang>/main.ftl` and are embedded at compile time,
//! so the bot never depends on its working directory to find them.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use unic_langid::LanguageIdentifier;

/// Languages with a bundled resource
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "fa"];

/// Language used when the customer's client reports none or an unsupported one,
/// unless [`set_default_language`] chose another
pub const DEFAULT_LANGUAGE: &str = "en";

const EN_RESOURCE: &str = include_str!("../locales/en/main.ftl");
const FA_RESOURCE: &str = include_str!("../locales/fa/main.ftl");

/// Localization manager for the storefront bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every supported language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in [("en", EN_RESOURCE), ("fa", FA_RESOURCE)] {
            let locale: LanguageIdentifier = language.parse()?;
            bundles.insert(language.to_string(), Self::create_bundle(&locale, source)?);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Bidi isolation marks would end up inside phone numbers and order ids
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Failed to parse {locale} messages: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Failed to add {locale} messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message in the given language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(default_language()))
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {key}"),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .to_string()
    }
}

static LOCALIZATION_MANAGER: OnceLock<Option<LocalizationManager>> = OnceLock::new();
static CONFIGURED_DEFAULT: OnceLock<&'static str> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    let manager = LocalizationManager::new()?;
    let _ = LOCALIZATION_MANAGER.set(Some(manager));
    Ok(())
}

fn manager() -> Option<&'static LocalizationManager> {
    LOCALIZATION_MANAGER
        .get_or_init(|| LocalizationManager::new().ok())
        .as_ref()
}

/// Set the process-wide fallback language. Only the first call takes effect.
/// Returns `false` when the language has no bundled resource.
pub fn set_default_language(language_code: &str) -> bool {
    match supported_language(Some(language_code)) {
        Some(language) => {
            let _ = CONFIGURED_DEFAULT.set(language);
            true
        }
        None => false,
    }
}

/// The fallback language currently in effect
pub fn default_language() -> &'static str {
    CONFIGURED_DEFAULT.get().copied().unwrap_or(DEFAULT_LANGUAGE)
}

fn supported_language(language_code: Option<&str>) -> Option<&'static str> {
    let primary = language_code?
        .split(['-', '_'])
        .next()?
        .trim()
        .to_ascii_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|supported| *supported == primary)
}

/// Map a Telegram language code to a supported language, or `fallback`
pub fn resolve_language(language_code: Option<&str>, fallback: &'static str) -> &'static str {
    supported_language(language_code).unwrap_or(fallback)
}

/// Map a Telegram language code (`fa-IR`, `en_US`, ...) to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    resolve_language(language_code, default_language())
}

/// Get a localized message for the given language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    match manager() {
        Some(manager) => manager.get_message_in_language(key, detect_language(language_code), None),
        None => format!("Missing translation: {key}"),
    }
}

/// Get a localized message with arguments for the given language code
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    match manager() {
        Some(manager) => {
            manager.get_message_in_language(key, detect_language(language_code), Some(&args_map))
        }
        None => format!("Missing translation: {key}"),
    }
}
