//! Opaque backend handles passed through to importers.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use quarry_core::alloc::HashMap;

/// Type map of shared backend handles (graphics device, audio device,
/// physics instance, shader loader...).
///
/// The database never looks inside; importers fetch what they need with
/// [`Backends::get`].
#[derive(Clone, Default)]
pub struct Backends {
    handles: HashMap<TypeId, (&'static str, Arc<dyn Any + Send + Sync>)>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, replacing any previous handle of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, handle: Arc<T>) {
        let handle: Arc<dyn Any + Send + Sync> = handle;
        self.handles
            .insert(TypeId::of::<T>(), (std::any::type_name::<T>(), handle));
    }

    /// Builder-style [`Backends::insert`].
    pub fn with<T: Any + Send + Sync>(mut self, handle: Arc<T>) -> Self {
        self.insert(handle);
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let (_, handle) = self.handles.get(&TypeId::of::<T>())?;
        handle.clone().downcast::<T>().ok()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.handles.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.handles.values().map(|(name, _)| name))
            .finish()
    }
}
