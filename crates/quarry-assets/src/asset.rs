//! Asset identity and the single-flight resource lifecycle.
//!
//! An [`Asset`] is a GUID plus a lazy factory. Loading it produces a
//! [`Loaded`] resource that is shared while anything holds it and detaches
//! from its asset when the last reference goes away.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use quarry_core::Guid;

use crate::error::{AssetError, AssetResult};
use crate::resource::{Resource, ResourceType};

type ErasedResource = dyn Any + Send + Sync;

/// Factory that produces the resource of an asset.
///
/// # Example
///
/// ```ignore
/// struct ClipLoader { source: Arc<SourceFile> }
///
/// impl ResourceLoader for ClipLoader {
///     type Output = AudioClip;
///
///     fn load(&self, asset: &Asset) -> AssetResult<AudioClip> {
///         let bytes = self.source.read()?;
///         decode_clip(&bytes).map_err(|e| AssetError::load(asset.guid(), e.to_string()))
///     }
/// }
/// ```
pub trait ResourceLoader: Send + Sync + 'static {
    /// The resource type this loader produces.
    type Output: Resource;

    fn load(&self, asset: &Asset) -> AssetResult<Self::Output>;
}

/// Type-erased resource loader for dynamic dispatch.
pub trait ErasedResourceLoader: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    /// Run the factory and wrap the result in a [`Loaded`] linked to `asset`.
    fn load_erased(&self, asset: &Arc<Asset>) -> AssetResult<Arc<ErasedResource>>;
}

impl<L: ResourceLoader> ErasedResourceLoader for L {
    fn resource_type(&self) -> ResourceType {
        ResourceType::of::<L::Output>()
    }

    fn load_erased(&self, asset: &Arc<Asset>) -> AssetResult<Arc<ErasedResource>> {
        let value = self.load(asset)?;
        Ok(Arc::new(Loaded {
            value,
            asset: Some(asset.clone()),
        }))
    }
}

/// Adapter turning a closure into a [`ResourceLoader`].
pub struct FnLoader<F, T> {
    func: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> ResourceLoader for FnLoader<F, T>
where
    F: Fn(&Asset) -> AssetResult<T> + Send + Sync + 'static,
    T: Resource,
{
    type Output = T;

    fn load(&self, asset: &Asset) -> AssetResult<T> {
        (self.func)(asset)
    }
}

/// Stable identity plus a lazy resource factory.
///
/// At most one resource is current per asset. Concurrent [`Asset::load`]
/// calls serialize on the asset's load lock, so the factory never runs twice
/// at the same time and every caller receives the same live instance.
pub struct Asset {
    guid: Guid,
    resource_type: ResourceType,
    loader: Box<dyn ErasedResourceLoader>,
    load_lock: Mutex<()>,
    current: Mutex<Option<Weak<ErasedResource>>>,
}

impl Asset {
    pub fn new<L: ResourceLoader>(guid: Guid, loader: L) -> Arc<Self> {
        Arc::new(Self {
            guid,
            resource_type: ResourceType::of::<L::Output>(),
            loader: Box::new(loader),
            load_lock: Mutex::new(()),
            current: Mutex::new(None),
        })
    }

    /// Create an asset whose factory is a closure.
    pub fn from_fn<T, F>(guid: Guid, func: F) -> Arc<Self>
    where
        T: Resource,
        F: Fn(&Asset) -> AssetResult<T> + Send + Sync + 'static,
    {
        Self::new(
            guid,
            FnLoader {
                func,
                _marker: PhantomData,
            },
        )
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Load the resource, reusing the current one if it is still alive.
    pub fn load<T: Resource>(self: &Arc<Self>) -> AssetResult<Arc<Loaded<T>>> {
        self.check_type::<T>()?;
        let erased = self.load_erased()?;
        erased
            .downcast::<Loaded<T>>()
            .map_err(|_| AssetError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: self.resource_type.name(),
            })
    }

    /// Type-erased [`Asset::load`]. The value is always a `Loaded<T>`.
    pub fn load_erased(self: &Arc<Self>) -> AssetResult<Arc<ErasedResource>> {
        let _loading = self.load_lock.lock();
        if let Some(existing) = self.get_loaded_erased() {
            return Ok(existing);
        }

        let resource = self.loader.load_erased(self)?;
        *self.current.lock() = Some(Arc::downgrade(&resource));
        tracing::trace!("Loaded resource for asset {}", self.guid);
        Ok(resource)
    }

    /// Snapshot of the current resource without loading.
    pub fn get_loaded<T: Resource>(&self) -> Option<Arc<Loaded<T>>> {
        self.get_loaded_erased()?.downcast::<Loaded<T>>().ok()
    }

    pub fn get_loaded_erased(&self) -> Option<Arc<ErasedResource>> {
        self.current.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_loaded(&self) -> bool {
        self.get_loaded_erased().is_some()
    }

    fn check_type<T: Resource>(&self) -> AssetResult<()> {
        if self.resource_type.type_id() == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(AssetError::TypeMismatch {
                expected: T::type_name(),
                found: self.resource_type.name(),
            })
        }
    }

    /// Clear the current pointer if it still refers to `resource`.
    fn detach(&self, resource: *const ()) {
        let mut current = self.current.lock();
        let still_current = current
            .as_ref()
            .is_some_and(|weak| Weak::as_ptr(weak) as *const () == resource);
        if still_current {
            *current = None;
            tracing::trace!("Detached resource from asset {}", self.guid);
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("guid", &self.guid)
            .field("resource_type", &self.resource_type)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// A loaded resource.
///
/// Holds a strong link back to its asset. When the last `Arc<Loaded<T>>` is
/// dropped the resource detaches from the asset, unless a concurrent load has
/// already installed a newer resource.
pub struct Loaded<T: Resource> {
    value: T,
    asset: Option<Arc<Asset>>,
}

impl<T: Resource> Loaded<T> {
    /// Wrap a value that is not owned by any asset.
    pub fn standalone(value: T) -> Arc<Self> {
        Arc::new(Self { value, asset: None })
    }

    pub fn asset(&self) -> Option<&Arc<Asset>> {
        self.asset.as_ref()
    }

    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T: Resource> Deref for Loaded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Resource + fmt::Debug> fmt::Debug for Loaded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loaded")
            .field("value", &self.value)
            .field("asset", &self.asset.as_ref().map(|a| a.guid()))
            .finish()
    }
}

impl<T: Resource> Drop for Loaded<T> {
    fn drop(&mut self) {
        // The strong count is already zero, so no upgrade can succeed any
        // more. Only the pointer comparison is left to decide.
        if let Some(asset) = &self.asset {
            asset.detach(self as *const Self as *const ());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug)]
    struct Blob(u32);

    impl Resource for Blob {
        fn type_name() -> &'static str {
            "Blob"
        }
    }

    #[derive(Debug)]
    struct Other;

    impl Resource for Other {
        fn type_name() -> &'static str {
            "Other"
        }
    }

    fn counting_asset(calls: Arc<AtomicUsize>, delay: Duration) -> Arc<Asset> {
        Asset::from_fn(Guid::generate(), move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(delay);
            Ok(Blob(n as u32))
        })
    }

    #[test]
    fn test_load_reuses_live_resource() {
        let calls = Arc::new(AtomicUsize::new(0));
        let asset = counting_asset(calls.clone(), Duration::ZERO);

        let a = asset.load::<Blob>().unwrap();
        let b = asset.load::<Blob>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.asset().unwrap().guid(), asset.guid());
    }

    #[test]
    fn test_reload_after_release() {
        let calls = Arc::new(AtomicUsize::new(0));
        let asset = counting_asset(calls.clone(), Duration::ZERO);

        let first = asset.load::<Blob>().unwrap();
        assert_eq!(first.0, 0);
        drop(first);
        assert!(!asset.is_loaded());

        let second = asset.load::<Blob>().unwrap();
        assert_eq!(second.0, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_single_flight_concurrent_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let asset = counting_asset(calls.clone(), Duration::from_millis(20));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let asset = asset.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    asset.load::<Blob>().unwrap()
                })
            })
            .collect();

        let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(loaded.iter().all(|r| Arc::ptr_eq(r, &loaded[0])));
    }

    #[test]
    fn test_release_races_with_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let asset = counting_asset(calls, Duration::ZERO);

        for _ in 0..200 {
            let held = asset.load::<Blob>().unwrap();
            let loader = {
                let asset = asset.clone();
                thread::spawn(move || asset.load::<Blob>().unwrap())
            };
            drop(held);
            let fresh = loader.join().unwrap();

            // Whatever won, the asset must point at a live resource.
            let current = asset.get_loaded::<Blob>().unwrap();
            assert!(Arc::ptr_eq(&current, &fresh));
        }
    }

    #[test]
    fn test_type_mismatch() {
        let asset = Asset::from_fn(Guid::generate(), |_| Ok(Blob(1)));
        let err = asset.load::<Other>().unwrap_err();
        assert!(matches!(err, AssetError::TypeMismatch { .. }));
        assert!(!asset.is_loaded());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let asset = Asset::from_fn(Guid::generate(), move |asset| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AssetError::load(asset.guid(), "first attempt fails"))
            } else {
                Ok(Blob(7))
            }
        });

        assert!(asset.load::<Blob>().is_err());
        assert!(!asset.is_loaded());
        assert_eq!(asset.load::<Blob>().unwrap().0, 7);
    }

    #[test]
    fn test_standalone_resource() {
        let loaded = Loaded::standalone(Blob(3));
        assert!(loaded.asset().is_none());
        assert_eq!(loaded.get().0, 3);
    }

    #[test]
    fn test_erased_load_downcasts() {
        let asset = Asset::from_fn(Guid::generate(), |_| Ok(Blob(9)));
        let erased = asset.load_erased().unwrap();
        let typed = erased.downcast::<Loaded<Blob>>().unwrap();
        assert_eq!(typed.0, 9);
        assert_eq!(asset.resource_type().name(), "Blob");
    }
}
