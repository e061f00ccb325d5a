//! Memoization of expensive per-layer derived state.
//!
//! Entries are keyed by `(kind, options-fingerprint)` so identically
//! configured layers share one computed value, and a layer is *current* only
//! while its present options still match the key its entry was stored under.
//! The cache exclusively owns computed values; layers never hold them.

use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
};

use futures::future::join_all;

use crate::{
    fingerprint::{OptionsFingerprint, fingerprint_options},
    layer::LayerStack,
    plugins::{ComputedValue, LayerOptions, PluginKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: PluginKind,
    pub fingerprint: OptionsFingerprint,
}

impl CacheKey {
    pub fn for_options(options: &LayerOptions) -> Self {
        Self {
            kind: options.kind(),
            fingerprint: fingerprint_options(options),
        }
    }
}

type CleanupFn = Box<dyn FnOnce() + Send>;

/// A computed value plus its one-shot disposal hook.
pub struct CacheEntry {
    pub computed: ComputedValue,
    cleanup: Option<CleanupFn>,
}

impl CacheEntry {
    pub fn new(computed: ComputedValue) -> Self {
        Self {
            computed,
            cleanup: None,
        }
    }

    pub fn with_cleanup(computed: ComputedValue, cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            computed,
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Invoke the cleanup hook, at most once. A panicking hook is logged and
    /// swallowed; disposal must never block entry replacement or teardown.
    fn dispose(&mut self) {
        if let Some(cleanup) = self.cleanup.take()
            && catch_unwind(AssertUnwindSafe(cleanup)).is_err()
        {
            tracing::warn!("cache entry cleanup panicked");
        }
    }
}

impl Drop for CacheEntry {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("computed", &self.computed)
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Value-keyed store of computed per-layer state.
#[derive(Debug, Default)]
pub struct ComputedCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ComputedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `layer`'s entry is present under its current options. Layers
    /// whose kind has no compute step are trivially current.
    fn is_current(&self, options: &LayerOptions) -> bool {
        !options.has_compute() || self.entries.contains_key(&CacheKey::for_options(options))
    }

    /// True iff at least one layer's entry is missing or stale.
    pub fn is_any_outdated(&self, layers: &LayerStack) -> bool {
        layers.iter().any(|layer| !self.is_current(&layer.options))
    }

    /// Synchronous lookup under the current options value. Never computes.
    pub fn get(&self, options: &LayerOptions) -> Option<&CacheEntry> {
        self.entries.get(&CacheKey::for_options(options))
    }

    /// Install a precomputed entry under `options`, disposing any entry it
    /// replaces.
    pub fn put(&mut self, options: &LayerOptions, entry: CacheEntry) {
        self.entries.insert(CacheKey::for_options(options), entry);
    }

    /// Run the compute step for every outdated layer, all concurrently,
    /// awaiting every one before returning.
    ///
    /// Results are installed under the keys captured at call time
    /// (last-editor-wins: an edit racing a compute leaves the stale result
    /// under its own key, where it is simply not current for the edited
    /// layer). A failed compute installs nothing, so the layer stays outdated
    /// and shows up again on the next check; there is no automatic retry.
    #[tracing::instrument(skip_all, fields(layers = layers.len()))]
    pub async fn compute_outdated(&mut self, layers: &LayerStack) {
        let mut pending: Vec<(CacheKey, LayerOptions)> = Vec::new();
        for layer in layers {
            if self.is_current(&layer.options) {
                continue;
            }
            let key = CacheKey::for_options(&layer.options);
            if !pending.iter().any(|(existing, _)| *existing == key) {
                pending.push((key, layer.options.clone()));
            }
        }
        if pending.is_empty() {
            return;
        }

        let results = join_all(pending.into_iter().map(|(key, options)| async move {
            let result = options.compute().await;
            (key, result)
        }))
        .await;

        for (key, result) in results {
            match result {
                Ok(Some(entry)) => {
                    self.entries.insert(key, entry);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(kind = %key.kind, %err, "layer compute failed");
                }
            }
        }
    }

    /// Dispose every entry. The editor teardown path.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
