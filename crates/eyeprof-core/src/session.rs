//! Session values read during bootstrap.

use std::collections::HashMap;

/// Session key holding the viewer's chosen locale.
pub const LOCALE_KEY: &str = "locale";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    values: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The stored locale, ignoring empty values.
    pub fn locale(&self) -> Option<&str> {
        self.get(LOCALE_KEY).filter(|l| !l.is_empty())
    }
}
