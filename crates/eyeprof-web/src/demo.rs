//! In-memory content: blog posts, settings, translations and widgets.
//!
//! Blog lookups are recorded as persistence statements on the request's
//! profiler, timed as if they ran against a database.

use std::sync::{PoisonError, RwLock};

use eyeprof_core::bootstrap::{MemorySettingsStore, SYSTEM_DEFAULT_LANGUAGE};
use eyeprof_core::snapshot::Category;
use eyeprof_core::translate::MemoryTranslationStore;
use eyeprof_core::widgets::WidgetMeta;

use crate::middleware::RequestProfiler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Post {
    pub(crate) id: u64,
    pub(crate) title: String,
    pub(crate) body: String,
}

#[derive(Debug, Default)]
pub(crate) struct BlogStore {
    posts: RwLock<Vec<Post>>,
}

impl BlogStore {
    pub(crate) fn seeded() -> Self {
        let posts = vec![
            Post {
                id: 1,
                title: "Hello world".into(),
                body: "The first post of this site.".into(),
            },
            Post {
                id: 2,
                title: "Widgets explained".into(),
                body: "Widgets are small blocks placed on a page layout.".into(),
            },
        ];
        Self {
            posts: RwLock::new(posts),
        }
    }

    /// Newest first.
    pub(crate) fn find_all(&self, profiler: &RequestProfiler) -> Vec<Post> {
        profiler.measure(Category::Model, "Blog", || {
            profiler.query("SELECT id, title, body FROM blog ORDER BY id DESC", || {
                let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
                posts.iter().rev().cloned().collect()
            })
        })
    }

    pub(crate) fn find(&self, id: u64, profiler: &RequestProfiler) -> Option<Post> {
        let statement = format!("SELECT id, title, body FROM blog WHERE id = {} LIMIT 1", id);
        profiler.measure(Category::Model, "Blog", || {
            profiler.query(&statement, || {
                let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
                posts.iter().find(|p| p.id == id).cloned()
            })
        })
    }

    pub(crate) fn insert(&self, title: &str, body: &str, profiler: &RequestProfiler) -> Post {
        profiler.measure(Category::Model, "Blog", || {
            profiler.query("INSERT INTO blog (title, body) VALUES (?, ?)", || {
                let mut posts = self.posts.write().unwrap_or_else(PoisonError::into_inner);
                let id = posts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
                let post = Post {
                    id,
                    title: title.to_string(),
                    body: body.to_string(),
                };
                posts.push(post.clone());
                post
            })
        })
    }
}

pub(crate) fn settings() -> MemorySettingsStore {
    MemorySettingsStore::new()
        .with(SYSTEM_DEFAULT_LANGUAGE, "en")
        .with("system_title", "EyeProf demo")
}

pub(crate) fn translations() -> MemoryTranslationStore {
    let store = MemoryTranslationStore::new();
    store.insert("en", "Home", "Home");
    store.insert("en", "Latest posts", "Latest posts");
    store.insert("de", "Home", "Startseite");
    store.insert("de", "Latest posts", "Neueste Beiträge");
    store.insert("de", "Page not found", "Seite nicht gefunden");
    store
}

fn widget(id: u64, name: &str, module: Option<&str>, description: &str) -> WidgetMeta {
    WidgetMeta {
        id,
        name: name.to_string(),
        module: module.map(str::to_string),
        description: description.to_string(),
        is_paginated: false,
        is_acl_controlled: true,
        admin_form: Some("form".to_string()),
        enabled: true,
    }
}

pub(crate) fn widgets() -> Vec<WidgetMeta> {
    vec![
        widget(1, "HtmlBlock", None, "Insert any HTML you like."),
        widget(2, "Menu", Some("core"), "Render a menu."),
        widget(3, "Header", Some("core"), "Site logo and title."),
        widget(4, "LatestPosts", Some("blog"), "Most recent blog posts."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blog_store_records_statements() {
        let store = BlogStore::seeded();
        let profiler = RequestProfiler::for_test();

        assert_eq!(store.find_all(&profiler).first().map(|p| p.id), Some(2));
        assert!(store.find(9, &profiler).is_none());
        let post = store.insert("New", "Body", &profiler);
        assert_eq!(post.id, 3);

        let statements = profiler
            .with(|p| p.query_log().total_statements())
            .unwrap();
        assert_eq!(statements, 3);
        let models = profiler
            .with(|p| p.time_samples()[&Category::Model].len())
            .unwrap();
        assert_eq!(models, 1);
    }

    #[test]
    fn test_blog_store_without_profiler() {
        let store = BlogStore::seeded();
        let profiler = RequestProfiler::default();
        assert_eq!(store.find(1, &profiler).map(|p| p.title), Some("Hello world".into()));
    }
}
