//! Importer serializers and the extension registry.
//!
//! A serializer is the factory for one kind of [`AssetImporter`] plus the
//! (de)serializer of that importer's persisted settings. The registry maps
//! file extensions to serializers.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use quarry_core::alloc::HashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AssetResult;
use crate::importer::AssetImporter;

/// Typed importer factory.
///
/// # Example
///
/// ```ignore
/// struct ClipSerializer;
///
/// impl ImporterSerializer for ClipSerializer {
///     type Importer = ClipImporter;
///     type Settings = ClipSettings;
///
///     fn name(&self) -> &str { "clip" }
///     fn extensions(&self) -> &[&str] { &["wav", "ogg"] }
///     fn create_importer(&self) -> ClipImporter { ClipImporter::default() }
///     fn settings(&self, importer: &ClipImporter) -> ClipSettings {
///         ClipSettings { guid: importer.guid }
///     }
///     fn apply_settings(&self, importer: &mut ClipImporter, settings: ClipSettings) {
///         importer.guid = settings.guid;
///     }
/// }
/// ```
pub trait ImporterSerializer: Send + Sync + 'static {
    type Importer: AssetImporter;
    type Settings: Serialize + DeserializeOwned + Default;

    /// Unique name, written into settings sidecars.
    fn name(&self) -> &str;

    /// Extensions registered by [`SerializerRegistry::register`].
    fn extensions(&self) -> &[&str];

    fn create_importer(&self) -> Self::Importer;

    /// Snapshot of the settings that must survive a restart.
    fn settings(&self, importer: &Self::Importer) -> Self::Settings;

    fn apply_settings(&self, importer: &mut Self::Importer, settings: Self::Settings);
}

/// Type-erased serializer for dynamic dispatch.
pub trait ErasedSerializer: Send + Sync {
    fn name(&self) -> &str;

    fn extensions(&self) -> &[&str];

    fn create_importer(&self) -> Box<dyn AssetImporter>;

    /// Settings of `importer` as JSON, or `None` if it was not created by
    /// this serializer.
    fn read_settings(&self, importer: &dyn AssetImporter) -> AssetResult<Option<serde_json::Value>>;

    /// Apply JSON settings. Returns `false` if `importer` is not ours.
    fn apply_settings(
        &self,
        importer: &mut dyn AssetImporter,
        settings: serde_json::Value,
    ) -> AssetResult<bool>;
}

impl<S: ImporterSerializer> ErasedSerializer for S {
    fn name(&self) -> &str {
        ImporterSerializer::name(self)
    }

    fn extensions(&self) -> &[&str] {
        ImporterSerializer::extensions(self)
    }

    fn create_importer(&self) -> Box<dyn AssetImporter> {
        Box::new(ImporterSerializer::create_importer(self))
    }

    fn read_settings(&self, importer: &dyn AssetImporter) -> AssetResult<Option<serde_json::Value>> {
        let any: &dyn Any = importer;
        match any.downcast_ref::<S::Importer>() {
            Some(importer) => Ok(Some(serde_json::to_value(self.settings(importer))?)),
            None => Ok(None),
        }
    }

    fn apply_settings(
        &self,
        importer: &mut dyn AssetImporter,
        settings: serde_json::Value,
    ) -> AssetResult<bool> {
        let any: &mut dyn Any = importer;
        let Some(importer) = any.downcast_mut::<S::Importer>() else {
            return Ok(false);
        };
        let settings: S::Settings = serde_json::from_value(settings)?;
        ImporterSerializer::apply_settings(self, importer, settings);
        Ok(true)
    }
}

/// Identity comparison for serializers.
pub fn same_serializer(a: &Arc<dyn ErasedSerializer>, b: &Arc<dyn ErasedSerializer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Lowercase an extension and make sure it starts with a dot.
pub fn canonical_extension(extension: &str) -> String {
    let lower = extension.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// A serializer that can import a given path, with the extension it matched.
#[derive(Clone)]
pub struct Candidate {
    pub extension: String,
    pub serializer: Arc<dyn ErasedSerializer>,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("extension", &self.extension)
            .field("serializer", &self.serializer.name())
            .finish()
    }
}

struct Registration {
    serializer: Arc<dyn ErasedSerializer>,
    count: usize,
}

/// Registry of importer serializers, indexed by extension.
///
/// Registrations are reference counted per (extension, serializer) pair, so
/// independent owners can register the same serializer and each unregister
/// their own claim. Several serializers may share an extension; they are
/// tried in registration order.
///
/// The registry is an explicit value: build it once, register serializers,
/// and hand it to the databases that should use it.
#[derive(Default)]
pub struct SerializerRegistry {
    by_extension: RwLock<HashMap<String, Vec<Registration>>>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed serializer for all of its declared extensions.
    ///
    /// Returns the erased handle, needed to unregister it later.
    pub fn register<S: ImporterSerializer>(&self, serializer: S) -> Arc<dyn ErasedSerializer> {
        let serializer: Arc<dyn ErasedSerializer> = Arc::new(serializer);
        self.register_erased(&serializer);
        serializer
    }

    /// Register an erased serializer for all of its declared extensions.
    pub fn register_erased(&self, serializer: &Arc<dyn ErasedSerializer>) {
        for ext in serializer.extensions() {
            self.register_extension(ext, serializer.clone());
        }
    }

    /// Register `serializer` for one extension.
    pub fn register_extension(&self, extension: &str, serializer: Arc<dyn ErasedSerializer>) {
        let extension = canonical_extension(extension);
        let mut map = self.by_extension.write();
        let entries = map.entry(extension.clone()).or_default();
        match entries
            .iter_mut()
            .find(|r| same_serializer(&r.serializer, &serializer))
        {
            Some(existing) => existing.count += 1,
            None => {
                tracing::debug!(
                    "Registered importer '{}' for {}",
                    serializer.name(),
                    extension
                );
                entries.push(Registration {
                    serializer,
                    count: 1,
                });
            }
        }
    }

    /// Drop one claim on all extensions the serializer declares.
    pub fn unregister(&self, serializer: &Arc<dyn ErasedSerializer>) {
        for ext in serializer.extensions() {
            self.unregister_extension(ext, serializer);
        }
    }

    /// Drop one claim on `extension`. Returns `true` if a claim existed.
    pub fn unregister_extension(&self, extension: &str, serializer: &Arc<dyn ErasedSerializer>) -> bool {
        let extension = canonical_extension(extension);
        let mut map = self.by_extension.write();
        let Some(entries) = map.get_mut(&extension) else {
            return false;
        };
        let Some(index) = entries
            .iter()
            .position(|r| same_serializer(&r.serializer, serializer))
        else {
            return false;
        };

        entries[index].count -= 1;
        if entries[index].count == 0 {
            entries.remove(index);
            tracing::debug!(
                "Unregistered importer '{}' from {}",
                serializer.name(),
                extension
            );
        }
        if entries.is_empty() {
            map.remove(&extension);
        }
        true
    }

    /// Serializers that can import `path`, longest matching extension first.
    ///
    /// `scene.tar.gz` is matched against `.tar.gz` before `.gz`. Each
    /// serializer appears once, with the longest extension it matched.
    pub fn candidates(&self, path: &Path) -> Vec<Candidate> {
        let Some(name) = path.file_name() else {
            return Vec::new();
        };
        let name = name.to_string_lossy().to_lowercase();

        let map = self.by_extension.read();
        let mut candidates: Vec<Candidate> = Vec::new();
        for (index, _) in name.match_indices('.') {
            let suffix = &name[index..];
            let Some(entries) = map.get(suffix) else {
                continue;
            };
            for entry in entries {
                if candidates
                    .iter()
                    .any(|c| same_serializer(&c.serializer, &entry.serializer))
                {
                    continue;
                }
                candidates.push(Candidate {
                    extension: suffix.to_string(),
                    serializer: entry.serializer.clone(),
                });
            }
        }
        candidates
    }

    /// Find a registered serializer by name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn ErasedSerializer>> {
        self.by_extension
            .read()
            .values()
            .flatten()
            .find(|r| r.serializer.name() == name)
            .map(|r| r.serializer.clone())
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.by_extension
            .read()
            .contains_key(&canonical_extension(extension))
    }

    /// All registered extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.by_extension.read().keys().cloned().collect();
        extensions.sort();
        extensions
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.read().is_empty()
    }
}
