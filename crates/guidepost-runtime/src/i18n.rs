#![forbid(unsafe_code)]

//! Translation lookup for tour text.
//!
//! Tour content carries translation keys together with fallback text. A
//! [`Translator`] maps a key to text for the active locale and must tolerate
//! absence: a missing key, a missing locale table, or no translator at all
//! all resolve to the fallback.
//!
//! [`Catalog`] is the bundled implementation: per-locale tables with a
//! fallback chain from the most specific tag (`zh-CN`) to its language
//! (`zh`) and finally the catalog's default locale.

use std::collections::HashMap;
use std::env;

/// Normalized locale tag (`en`, `en-US`, `zh-CN`).
pub type Locale = String;

/// Key → text lookup.
pub trait Translator {
    /// Translate `key`, or return `fallback` when no translation exists.
    fn translate(&self, key: &str, fallback: &str) -> String;
}

/// Translator that always returns the fallback text.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTranslations;

impl Translator for NoTranslations {
    fn translate(&self, _key: &str, fallback: &str) -> String {
        fallback.to_string()
    }
}

/// Per-locale translation tables.
#[derive(Debug, Clone)]
pub struct Catalog {
    locale: Locale,
    default_locale: Locale,
    tables: HashMap<Locale, HashMap<String, String>>,
}

impl Catalog {
    /// Create an empty catalog for `locale`, falling back to `default_locale`.
    #[must_use]
    pub fn new(locale: impl Into<Locale>, default_locale: impl Into<Locale>) -> Self {
        Self {
            locale: normalize_locale(&locale.into()),
            default_locale: normalize_locale(&default_locale.into()),
            tables: HashMap::new(),
        }
    }

    /// Catalog for the system locale with `en` as default.
    #[must_use]
    pub fn system() -> Self {
        Self::new(detect_system_locale(), "en")
    }

    /// Add (or extend) the table for a locale.
    #[must_use]
    pub fn with_table<K, V>(
        mut self,
        locale: &str,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.insert_table(locale, entries);
        self
    }

    /// Add (or extend) the table for a locale in place.
    pub fn insert_table<K, V>(&mut self, locale: &str, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let table = self.tables.entry(normalize_locale(locale)).or_default();
        table.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Switch the active locale.
    pub fn set_locale(&mut self, locale: &str) {
        self.locale = normalize_locale(locale);
    }

    /// Active locale.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Locales consulted for a lookup, most specific first.
    #[must_use]
    pub fn fallback_chain(&self) -> Vec<Locale> {
        let mut chain = vec![self.locale.clone()];
        if let Some((language, _)) = self.locale.split_once('-') {
            chain.push(language.to_string());
        }
        if !chain.contains(&self.default_locale) {
            chain.push(self.default_locale.clone());
        }
        chain
    }

    /// Load tables from JSON: `{ "en": { "key": "text" }, "zh-CN": { ... } }`.
    #[cfg(feature = "json-catalog")]
    pub fn from_json_str(
        locale: &str,
        default_locale: &str,
        json: &str,
    ) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, HashMap<String, String>> = serde_json::from_str(json)?;
        let mut catalog = Self::new(locale, default_locale);
        for (loc, entries) in raw {
            catalog.insert_table(&loc, entries);
        }
        Ok(catalog)
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str, fallback: &str) -> String {
        self.fallback_chain()
            .iter()
            .filter_map(|loc| self.tables.get(loc))
            .find_map(|table| table.get(key))
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Detect the system locale from environment variables.
///
/// Preference order: `LC_ALL`, then `LANG`. Falls back to `"en"` when unknown.
#[must_use]
pub fn detect_system_locale() -> Locale {
    let lc_all = env::var("LC_ALL").ok();
    let lang = env::var("LANG").ok();
    detect_system_locale_from(lc_all.as_deref(), lang.as_deref())
}

fn detect_system_locale_from(lc_all: Option<&str>, lang: Option<&str>) -> Locale {
    lc_all
        .and_then(normalize_locale_raw)
        .or_else(|| lang.and_then(normalize_locale_raw))
        .unwrap_or_else(|| "en".to_string())
}

fn normalize_locale(raw: &str) -> Locale {
    normalize_locale_raw(raw).unwrap_or_else(|| "en".to_string())
}

/// Strip codeset and modifier (`en_US.UTF-8@latin` → `en-US`); `C` and
/// `POSIX` map to `en`.
fn normalize_locale_raw(raw: &str) -> Option<Locale> {
    let raw = raw.trim();
    let raw = raw.split('@').next().unwrap_or(raw);
    let raw = raw.split('.').next().unwrap_or(raw).trim();
    if raw.is_empty() {
        return None;
    }
    if raw.eq_ignore_ascii_case("c") || raw.eq_ignore_ascii_case("posix") {
        return Some("en".to_string());
    }
    Some(raw.replace('_', "-"))
}
