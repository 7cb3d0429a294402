//! Backend cache keyed by model path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use tracing::{debug, info};

use crate::backend::{BackendError, ModelBackend, ModelLoader, RuntimeOptions};

type Slot = Arc<Mutex<Option<Arc<dyn ModelBackend>>>>;

/// Wraps a loader so each model file is loaded at most once.
///
/// Every path gets its own slot mutex: concurrent first requests for the
/// same model wait on one load while other paths proceed. A failed load
/// removes its slot so the next request retries and unknown paths do not
/// accumulate.
pub struct CachingLoader {
    inner: Arc<dyn ModelLoader>,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl std::fmt::Debug for CachingLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CachingLoader({} models)", self.len())
    }
}

impl CachingLoader {
    pub fn new(inner: Arc<dyn ModelLoader>) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of loaded models.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, model_path: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(model_path.to_path_buf()).or_default())
    }

    /// Remove `slot` if it is still the entry for `model_path` and nothing
    /// has been loaded into it. A slot another request is loading into is
    /// left alone.
    fn discard_empty(&self, model_path: &Path, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = slots.get(model_path) else {
            return;
        };
        if !Arc::ptr_eq(current, slot) {
            return;
        }
        let empty = match slot.try_lock() {
            Ok(guard) => guard.is_none(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_none(),
            Err(TryLockError::WouldBlock) => false,
        };
        if empty {
            slots.remove(model_path);
        }
    }
}

impl ModelLoader for CachingLoader {
    fn load(
        &self,
        model_path: &Path,
        options: &RuntimeOptions,
    ) -> Result<Arc<dyn ModelBackend>, BackendError> {
        let slot = self.slot(model_path);
        // A panic during a previous load leaves the slot empty, so a poisoned
        // lock is safe to reuse.
        let mut loaded = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(backend) = loaded.as_ref() {
            debug!(model_path = %model_path.display(), "reusing cached model");
            return Ok(Arc::clone(backend));
        }

        let backend = match self.inner.load(model_path, options) {
            Ok(backend) => backend,
            Err(e) => {
                drop(loaded);
                self.discard_empty(model_path, &slot);
                return Err(e);
            }
        };
        info!(model_path = %model_path.display(), "model loaded and cached");
        *loaded = Some(Arc::clone(&backend));
        Ok(backend)
    }
}
