//! Per-request module bootstrap.
//!
//! Resolves the locale, picks a translator, decides whether diagnostics are
//! collected for this viewer and warms the widget metadata cache. Every
//! input is passed in explicitly through [`BootstrapContext`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{BootstrapError, StoreError};
use crate::gate::Viewer;
use crate::session::Session;
use crate::translate::{ArrayTranslator, DbTranslator, FALLBACK_LOCALE, TranslationStore, Translator};
use crate::widgets::{WidgetCache, WidgetMap, WidgetRegistry, WidgetStore, warm_widgets};

/// Setting holding the site-wide default locale.
pub const SYSTEM_DEFAULT_LANGUAGE: &str = "system_default_language";

pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, name: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    values: HashMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_setting(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(name).cloned())
    }
}

/// Session locale first, then (installed only) the default-language
/// setting, then `"en"`. A failing settings store falls through to `"en"`.
pub fn resolve_locale(installed: bool, session: &Session, settings: &dyn SettingsStore) -> String {
    if let Some(locale) = session.locale() {
        return locale.to_string();
    }
    if installed {
        match settings.get_setting(SYSTEM_DEFAULT_LANGUAGE) {
            Ok(Some(locale)) if !locale.is_empty() => return locale,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to read default language setting"),
        }
    }
    FALLBACK_LOCALE.to_string()
}

/// File-backed translator unless the site is installed and in debug mode.
pub fn select_translator(
    config: &AppConfig,
    locale: &str,
    translations: &Arc<dyn TranslationStore>,
) -> Result<Arc<dyn Translator>, BootstrapError> {
    if !config.application.debug || !config.installed {
        let translator = ArrayTranslator::load(&config.application.languages_dir, locale)?;
        return Ok(Arc::new(translator));
    }
    Ok(Arc::new(DbTranslator::new(locale, Arc::clone(translations))))
}

/// Inputs of [`ModuleBootstrap::register_services`].
pub struct BootstrapContext<'a> {
    pub config: &'a AppConfig,
    pub session: &'a Session,
    pub viewer: &'a Viewer,
    pub settings: &'a dyn SettingsStore,
    pub translations: Arc<dyn TranslationStore>,
    pub widgets: &'a dyn WidgetStore,
    pub widget_cache: &'a WidgetCache,
    pub registry: &'a WidgetRegistry,
}

/// Services wired for one request.
pub struct ModuleServices {
    pub locale: String,
    pub translator: Arc<dyn Translator>,
    /// Whether a profiler should be kept for this request.
    pub collect_diagnostics: bool,
    /// Widget metadata, absent when the site is not installed.
    pub widgets: Option<Arc<WidgetMap>>,
}

impl std::fmt::Debug for ModuleServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleServices")
            .field("locale", &self.locale)
            .field("translator", &self.translator.locale())
            .field("collect_diagnostics", &self.collect_diagnostics)
            .field("widgets", &self.widgets.as_ref().map(|w| w.len()))
            .finish()
    }
}

pub struct ModuleBootstrap;

impl ModuleBootstrap {
    pub fn register_services(ctx: &BootstrapContext<'_>) -> Result<ModuleServices, BootstrapError> {
        let installed = ctx.config.installed;
        let locale = resolve_locale(installed, ctx.session, ctx.settings);
        let translator = select_translator(ctx.config, &locale, &ctx.translations)?;

        if !installed {
            debug!(%locale, "not installed, skipping remaining services");
            return Ok(ModuleServices {
                locale,
                translator,
                collect_diagnostics: true,
                widgets: None,
            });
        }

        let collect_diagnostics = ctx.viewer.is_authenticated();
        if !collect_diagnostics {
            debug!("anonymous viewer, profiler removed");
        }

        let widgets = warm_widgets(ctx.widget_cache, ctx.widgets)?;
        ctx.registry.set(Arc::clone(&widgets));

        debug!(
            %locale,
            collect_diagnostics,
            widgets = widgets.len(),
            "module services registered"
        );
        Ok(ModuleServices {
            locale,
            translator,
            collect_diagnostics,
            widgets: Some(widgets),
        })
    }
}
