//! Widget metadata: loaded from the store once, cached for a month, and
//! published to a process-wide registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// Cache key under which the widget map is kept.
pub const WIDGETS_CACHE_KEY: &str = "widgets_metadata.cache";

/// Widget map lifetime in the cache: 30 days.
pub const WIDGETS_CACHE_TTL: Duration = Duration::from_secs(2_592_000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetMeta {
    pub id: u64,
    pub name: String,
    pub module: Option<String>,
    pub description: String,
    pub is_paginated: bool,
    pub is_acl_controlled: bool,
    pub admin_form: Option<String>,
    pub enabled: bool,
}

/// Widgets keyed by id.
pub type WidgetMap = BTreeMap<u64, WidgetMeta>;

pub trait WidgetStore: Send + Sync {
    fn find_all(&self) -> Result<Vec<WidgetMeta>, StoreError>;
}

/// Keyed TTL cache for widget metadata.
#[derive(Clone)]
pub struct WidgetCache {
    inner: Cache<String, Arc<WidgetMap>>,
}

impl WidgetCache {
    pub fn new() -> Self {
        Self::with_ttl(WIDGETS_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }

    pub fn get(&self) -> Option<Arc<WidgetMap>> {
        self.inner.get(WIDGETS_CACHE_KEY)
    }

    pub fn put(&self, widgets: Arc<WidgetMap>) {
        self.inner.insert(WIDGETS_CACHE_KEY.to_string(), widgets);
    }

    pub fn invalidate(&self) {
        self.inner.invalidate(WIDGETS_CACHE_KEY);
    }
}

impl Default for WidgetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WidgetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetCache")
            .field("cached", &self.inner.contains_key(WIDGETS_CACHE_KEY))
            .finish()
    }
}

/// Returns the cached widget map, loading it from `store` on a miss.
pub fn warm_widgets(cache: &WidgetCache, store: &dyn WidgetStore) -> Result<Arc<WidgetMap>, StoreError> {
    if let Some(widgets) = cache.get() {
        debug!(widgets = widgets.len(), "widget metadata cache hit");
        return Ok(widgets);
    }
    let widgets: WidgetMap = store
        .find_all()?
        .into_iter()
        .map(|w| (w.id, w))
        .collect();
    let widgets = Arc::new(widgets);
    cache.put(Arc::clone(&widgets));
    debug!(widgets = widgets.len(), "widget metadata loaded from store");
    Ok(widgets)
}

/// Process-wide view of the current widget map.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    widgets: RwLock<Arc<WidgetMap>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, widgets: Arc<WidgetMap>) {
        *self.widgets.write().unwrap_or_else(PoisonError::into_inner) = widgets;
    }

    pub fn get(&self) -> Arc<WidgetMap> {
        Arc::clone(&self.widgets.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }
}

/// In-memory [`WidgetStore`] counting how often it is read.
#[derive(Debug, Default)]
pub struct MemoryWidgetStore {
    widgets: Vec<WidgetMeta>,
    loads: AtomicUsize,
}

impl MemoryWidgetStore {
    pub fn new(widgets: Vec<WidgetMeta>) -> Self {
        Self {
            widgets,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl WidgetStore for MemoryWidgetStore {
    fn find_all(&self) -> Result<Vec<WidgetMeta>, StoreError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.widgets.clone())
    }
}
