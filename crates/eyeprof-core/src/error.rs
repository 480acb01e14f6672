//! Error types for configuration loading, backing stores and bootstrap.

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    Io(std::io::Error),
    /// Configuration file is not valid TOML for [`crate::config::AppConfig`].
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Error type for backing stores (settings, translations, widgets).
#[derive(Debug)]
pub enum StoreError {
    /// Store is not reachable.
    Unavailable(String),
    /// Lookup failed.
    Query(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "store query error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Error type for module bootstrap.
#[derive(Debug)]
pub enum BootstrapError {
    /// Widget metadata could not be loaded.
    Store(StoreError),
    /// Language file could not be read.
    Io(std::io::Error),
    /// Language file is not a JSON object of strings.
    Language(serde_json::Error),
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapError::Store(e) => write!(f, "bootstrap: {}", e),
            BootstrapError::Io(e) => write!(f, "bootstrap I/O error: {}", e),
            BootstrapError::Language(e) => write!(f, "invalid language file: {}", e),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::Store(e) => Some(e),
            BootstrapError::Io(e) => Some(e),
            BootstrapError::Language(e) => Some(e),
        }
    }
}

impl From<StoreError> for BootstrapError {
    fn from(e: StoreError) -> Self {
        BootstrapError::Store(e)
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(e: std::io::Error) -> Self {
        BootstrapError::Io(e)
    }
}

impl From<serde_json::Error> for BootstrapError {
    fn from(e: serde_json::Error) -> Self {
        BootstrapError::Language(e)
    }
}
