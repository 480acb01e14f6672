//! Translators: an in-memory message table loaded from language files, and
//! a store-backed translator used while debugging.
//!
//! Both resolve `%name%` placeholders from the supplied parameters.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::{BootstrapError, StoreError};

/// Locale used when nothing else is configured.
pub const FALLBACK_LOCALE: &str = "en";

pub trait Translator: Send + Sync {
    /// Translates `key`, substituting `%name%` placeholders from `params`.
    /// Unknown keys are returned untranslated.
    fn query(&self, key: &str, params: &[(&str, &str)]) -> String;

    fn exists(&self, key: &str) -> bool;

    fn locale(&self) -> &str;
}

/// Replaces every `%name%` in `text` with its value.
pub fn interpolate(text: &str, params: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (name, value) in params {
        out = out.replace(&format!("%{}%", name), value);
    }
    out
}

// ============================================================
// Array translator
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct ArrayTranslator {
    locale: String,
    messages: HashMap<String, String>,
}

impl ArrayTranslator {
    pub fn new(locale: impl Into<String>, messages: HashMap<String, String>) -> Self {
        Self {
            locale: locale.into(),
            messages,
        }
    }

    /// Loads `<dir>/<locale>.json`, falling back to `<dir>/en.json`, then to
    /// an empty table. A file that exists but is not a JSON object of
    /// strings is an error.
    pub fn load(dir: &Path, locale: &str) -> Result<Self, BootstrapError> {
        let candidates = [locale, FALLBACK_LOCALE];
        for candidate in candidates {
            let path = dir.join(format!("{}.json", candidate));
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let messages: HashMap<String, String> = serde_json::from_str(&content)?;
            debug!(path = %path.display(), messages = messages.len(), "language file loaded");
            return Ok(Self::new(locale, messages));
        }
        debug!(dir = %dir.display(), locale, "no language file found");
        Ok(Self::new(locale, HashMap::new()))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Translator for ArrayTranslator {
    fn query(&self, key: &str, params: &[(&str, &str)]) -> String {
        let text = self.messages.get(key).map(String::as_str).unwrap_or(key);
        interpolate(text, params)
    }

    fn exists(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    fn locale(&self) -> &str {
        &self.locale
    }
}

// ============================================================
// Store-backed translator
// ============================================================

/// Persistent translation table.
pub trait TranslationStore: Send + Sync {
    fn find_translation(&self, locale: &str, original: &str) -> Result<Option<String>, StoreError>;

    /// Records a key that had no translation so it can be translated later.
    fn record_missing(&self, locale: &str, original: &str) -> Result<(), StoreError>;
}

pub struct DbTranslator {
    locale: String,
    store: Arc<dyn TranslationStore>,
}

impl DbTranslator {
    pub fn new(locale: impl Into<String>, store: Arc<dyn TranslationStore>) -> Self {
        Self {
            locale: locale.into(),
            store,
        }
    }
}

impl Translator for DbTranslator {
    fn query(&self, key: &str, params: &[(&str, &str)]) -> String {
        match self.store.find_translation(&self.locale, key) {
            Ok(Some(text)) => interpolate(&text, params),
            Ok(None) => {
                if let Err(e) = self.store.record_missing(&self.locale, key) {
                    warn!(error = %e, locale = %self.locale, key, "failed to record missing translation");
                }
                interpolate(key, params)
            }
            Err(e) => {
                warn!(error = %e, locale = %self.locale, key, "translation lookup failed");
                interpolate(key, params)
            }
        }
    }

    fn exists(&self, key: &str) -> bool {
        matches!(self.store.find_translation(&self.locale, key), Ok(Some(_)))
    }

    fn locale(&self) -> &str {
        &self.locale
    }
}

/// In-memory [`TranslationStore`]. Missing keys are recorded with an
/// identity translation, so they are found on the next lookup.
#[derive(Debug, Default)]
pub struct MemoryTranslationStore {
    entries: Mutex<HashMap<(String, String), String>>,
    missing: Mutex<Vec<(String, String)>>,
}

impl MemoryTranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locale: &str, original: &str, translated: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((locale.to_string(), original.to_string()), translated.to_string());
    }

    /// `(locale, key)` pairs recorded as missing, in recording order.
    pub fn missing(&self) -> Vec<(String, String)> {
        self.missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TranslationStore for MemoryTranslationStore {
    fn find_translation(&self, locale: &str, original: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(locale.to_string(), original.to_string()))
            .cloned())
    }

    fn record_missing(&self, locale: &str, original: &str) -> Result<(), StoreError> {
        self.missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((locale.to_string(), original.to_string()));
        self.insert(locale, original, original);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl TranslationStore for BrokenStore {
        fn find_translation(&self, _: &str, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        fn record_missing(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[test]
    fn test_interpolate() {
        assert_eq!(
            interpolate("Hello %name%, %n% new", &[("name", "Ann"), ("n", "3")]),
            "Hello Ann, 3 new"
        );
        assert_eq!(interpolate("no params", &[]), "no params");
    }

    #[test]
    fn test_array_translator_query() {
        let mut messages = HashMap::new();
        messages.insert("Welcome, %user%".to_string(), "Willkommen, %user%".to_string());
        let t = ArrayTranslator::new("de", messages);
        assert_eq!(t.query("Welcome, %user%", &[("user", "Ann")]), "Willkommen, Ann");
        assert_eq!(t.query("Unknown", &[]), "Unknown");
        assert!(t.exists("Welcome, %user%"));
        assert!(!t.exists("Unknown"));
        assert_eq!(t.locale(), "de");
    }

    #[test]
    fn test_array_translator_load_locale_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("de.json"), r#"{"Home": "Startseite"}"#).unwrap();
        std::fs::write(dir.path().join("en.json"), r#"{"Home": "Home page"}"#).unwrap();
        let t = ArrayTranslator::load(dir.path(), "de").unwrap();
        assert_eq!(t.query("Home", &[]), "Startseite");
    }

    #[test]
    fn test_array_translator_falls_back_to_en() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), r#"{"Home": "Home page"}"#).unwrap();
        let t = ArrayTranslator::load(dir.path(), "fr").unwrap();
        assert_eq!(t.query("Home", &[]), "Home page");
        assert_eq!(t.locale(), "fr");
    }

    #[test]
    fn test_array_translator_empty_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let t = ArrayTranslator::load(dir.path(), "fr").unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn test_array_translator_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), "[1, 2]").unwrap();
        let err = ArrayTranslator::load(dir.path(), "en").unwrap_err();
        assert!(matches!(err, BootstrapError::Language(_)));
    }

    #[test]
    fn test_db_translator_records_missing() {
        let store = Arc::new(MemoryTranslationStore::new());
        store.insert("de", "Home", "Startseite");
        let t = DbTranslator::new("de", store.clone());

        assert_eq!(t.query("Home", &[]), "Startseite");
        assert_eq!(t.query("Posts: %n%", &[("n", "2")]), "Posts: 2");
        assert_eq!(store.missing(), vec![("de".to_string(), "Posts: %n%".to_string())]);

        // Recorded keys resolve to themselves afterwards and are not recorded twice.
        assert!(t.exists("Posts: %n%"));
        t.query("Posts: %n%", &[]);
        assert_eq!(store.missing().len(), 1);
    }

    #[test]
    fn test_db_translator_store_failure_returns_key() {
        let t = DbTranslator::new("de", Arc::new(BrokenStore));
        assert_eq!(t.query("Home %x%", &[("x", "1")]), "Home 1");
        assert!(!t.exists("Home"));
    }
}
