use crate::error::PharosError;
use crate::loader::image::{ImageLoadOptions, ImageLoader};
use crate::loader::module::ModuleLoader;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HintKind {
    Preconnect,
    Prefetch,
    DnsPrefetch,
    Preload,
}

/// A browser-style resource hint: the `kind` maps onto a `rel` value, the
/// `href` onto the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHint {
    pub kind: HintKind,
    pub href: String,
}

impl ResourceHint {
    pub fn new(kind: HintKind, href: impl Into<String>) -> Self {
        Self { kind, href: href.into() }
    }

    pub fn preconnect(href: impl Into<String>) -> Self {
        Self::new(HintKind::Preconnect, href)
    }

    pub fn prefetch(href: impl Into<String>) -> Self {
        Self::new(HintKind::Prefetch, href)
    }

    pub fn dns_prefetch(href: impl Into<String>) -> Self {
        Self::new(HintKind::DnsPrefetch, href)
    }

    pub fn preload(href: impl Into<String>) -> Self {
        Self::new(HintKind::Preload, href)
    }
}

/// Receives deduplicated hints; the host side turns them into `<link>`
/// elements, fetch warmup, or a service-worker message.
pub trait HintSink: Send + Sync {
    fn apply(&self, hint: &ResourceHint);
}

#[derive(Default)]
pub struct MemoryHintSink {
    hints: Mutex<Vec<ResourceHint>>,
}

impl MemoryHintSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hints(&self) -> Vec<ResourceHint> {
        self.hints.lock().clone()
    }
}

impl HintSink for MemoryHintSink {
    fn apply(&self, hint: &ResourceHint) {
        self.hints.lock().push(hint.clone());
    }
}

/// Warms modules and images ahead of demand and issues resource hints. All
/// spawned work is kept as abortable handles; `join_pending` gives tests and
/// shutdown an awaitable join point.
#[derive(Default)]
pub struct Preloader {
    issued: Mutex<FxHashSet<ResourceHint>>,
    sink: Option<Arc<dyn HintSink>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Preloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn HintSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Starts the keyed load in the background; the module loader's dedup map
    /// makes the eventual on-demand `load` a cache hit.
    pub fn preload_module<T, F, Fut>(&self, loader: &ModuleLoader<T>, key: &str, factory: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PharosError>> + Send + 'static,
    {
        let handle = loader.load(key, factory);
        let join = tokio::spawn(async move {
            let _ = handle.wait().await;
        });
        self.tasks.lock().push(join);
    }

    /// Fetches the image as critical (no visibility gating) so a later gated
    /// load resolves from the byte cache.
    pub fn preload_image(&self, loader: &ImageLoader, src: &str) {
        let task = loader.load(src, ImageLoadOptions { critical: true, low_quality_src: None });
        let join = tokio::spawn(async move {
            let _ = task.wait().await;
        });
        self.tasks.lock().push(join);
    }

    /// Issues hints not seen before; returns how many were newly applied.
    pub fn preload_resources(&self, hints: impl IntoIterator<Item = ResourceHint>) -> usize {
        let mut issued = self.issued.lock();
        let mut applied = 0;

        for hint in hints {
            if issued.contains(&hint) {
                continue;
            }
            if let Some(sink) = &self.sink {
                sink.apply(&hint);
            }
            tracing::debug!(kind = ?hint.kind, href = %hint.href, "resource hint issued");
            issued.insert(hint);
            applied += 1;
        }

        applied
    }

    pub fn is_issued(&self, hint: &ResourceHint) -> bool {
        self.issued.lock().contains(hint)
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    pub async fn join_pending(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.tasks.lock();
            guard.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    pub fn abort_all(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
