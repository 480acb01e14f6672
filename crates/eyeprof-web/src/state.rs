//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::sync::Arc;

use eyeprof_core::bootstrap::{BootstrapContext, MemorySettingsStore, ModuleBootstrap, ModuleServices};
use eyeprof_core::config::AppConfig;
use eyeprof_core::error::BootstrapError;
use eyeprof_core::gate::{DiagnosticsGate, Viewer};
use eyeprof_core::memory::MemoryReader;
use eyeprof_core::session::Session;
use eyeprof_core::translate::{MemoryTranslationStore, TranslationStore};
use eyeprof_core::widgets::{MemoryWidgetStore, WidgetCache, WidgetRegistry};

use crate::demo::BlogStore;
use crate::routes::RouteTable;

pub(crate) struct WebApp {
    pub(crate) config: AppConfig,
    pub(crate) gate: DiagnosticsGate,
    pub(crate) settings: MemorySettingsStore,
    pub(crate) translations: Arc<MemoryTranslationStore>,
    pub(crate) widget_store: MemoryWidgetStore,
    pub(crate) widget_cache: WidgetCache,
    pub(crate) registry: WidgetRegistry,
    pub(crate) memory: Arc<dyn MemoryReader>,
    pub(crate) routes: RouteTable,
    pub(crate) blog: BlogStore,
    /// Directory reported snapshots are saved to, if any.
    pub(crate) capture_dir: Option<PathBuf>,
}

pub(crate) type SharedState = Arc<WebApp>;

impl WebApp {
    pub(crate) fn new(config: AppConfig, memory: Arc<dyn MemoryReader>) -> Self {
        Self {
            gate: DiagnosticsGate::from_config(&config),
            config,
            settings: crate::demo::settings(),
            translations: Arc::new(crate::demo::translations()),
            widget_store: MemoryWidgetStore::new(crate::demo::widgets()),
            widget_cache: WidgetCache::new(),
            registry: WidgetRegistry::new(),
            memory,
            routes: RouteTable::standard(),
            blog: BlogStore::seeded(),
            capture_dir: None,
        }
    }

    pub(crate) fn with_capture_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.capture_dir = dir;
        self
    }

    /// Wires the module services for one request.
    pub(crate) fn bootstrap(
        &self,
        session: &Session,
        viewer: &Viewer,
    ) -> Result<ModuleServices, BootstrapError> {
        let translations: Arc<dyn TranslationStore> = self.translations.clone();
        let ctx = BootstrapContext {
            config: &self.config,
            session,
            viewer,
            settings: &self.settings,
            translations,
            widgets: &self.widget_store,
            widget_cache: &self.widget_cache,
            registry: &self.registry,
        };
        ModuleBootstrap::register_services(&ctx)
    }
}
