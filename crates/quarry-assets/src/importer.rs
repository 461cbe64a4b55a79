//! Per-file importers and the context they run in.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use quarry_core::Guid;
use sha2::{Digest, Sha256};

use crate::asset::Asset;
use crate::backends::Backends;
use crate::database::DatabaseRef;
use crate::error::{AssetError, AssetResult};

/// One asset reported by an importer.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub asset: Arc<Asset>,
    /// Display name. `None` means "use the source file name".
    pub resource_name: Option<String>,
}

impl AssetInfo {
    pub fn new(asset: Arc<Asset>) -> Self {
        Self {
            asset,
            resource_name: None,
        }
    }

    pub fn named(asset: Arc<Asset>, name: impl Into<String>) -> Self {
        Self {
            asset,
            resource_name: Some(name.into()),
        }
    }
}

/// Shared handle to a tracked source file.
///
/// The path follows renames. Once the file is erased the handle is
/// invalidated and [`SourceFile::read`] fails, so loaders holding it stop
/// producing resources for a file that is gone.
#[derive(Debug)]
pub struct SourceFile {
    path: RwLock<PathBuf>,
    erased: AtomicBool,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: RwLock::new(path.into()),
            erased: AtomicBool::new(false),
        })
    }

    /// Current canonical path.
    pub fn path(&self) -> PathBuf {
        self.path.read().clone()
    }

    /// File name without its last extension.
    pub fn stem(&self) -> String {
        file_stem(&self.path.read())
    }

    pub fn is_erased(&self) -> bool {
        self.erased.load(Ordering::Acquire)
    }

    /// Read the file's current content.
    pub fn read(&self) -> AssetResult<Vec<u8>> {
        let path = self.path();
        if self.is_erased() {
            return Err(AssetError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source file was erased"),
            ));
        }
        std::fs::read(&path).map_err(|e| AssetError::io(&path, e))
    }

    pub(crate) fn set_path(&self, path: PathBuf) {
        *self.path.write() = path;
    }

    pub(crate) fn invalidate(&self) {
        self.erased.store(true, Ordering::Release);
    }
}

/// Display name derived from a path: the file name without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Everything an importer may look at while importing one file.
pub struct ImportContext<'a> {
    source: &'a Arc<SourceFile>,
    path: &'a Path,
    bytes: &'a [u8],
    extension: &'a str,
    database: DatabaseRef,
    backends: &'a Backends,
    previous_import_data: &'a str,
    import_data: String,
    content_hash: Option<String>,
    reported: Vec<AssetInfo>,
}

impl<'a> ImportContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: &'a Arc<SourceFile>,
        path: &'a Path,
        bytes: &'a [u8],
        extension: &'a str,
        database: DatabaseRef,
        backends: &'a Backends,
        previous_import_data: &'a str,
    ) -> Self {
        Self {
            source,
            path,
            bytes,
            extension,
            database,
            backends,
            previous_import_data,
            import_data: String::new(),
            content_hash: None,
            reported: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    /// The registered extension that selected this importer, e.g. `".wav"`.
    pub fn extension(&self) -> &str {
        self.extension
    }

    /// Shared source handle, for loaders that re-read the file later.
    pub fn source(&self) -> &Arc<SourceFile> {
        self.source
    }

    /// Token stored by the last successful import of an unchanged file.
    ///
    /// Empty when the file changed since, or when there is no record.
    pub fn previous_import_data(&self) -> &str {
        self.previous_import_data
    }

    /// Token to hand back on the next import. Only kept on success.
    pub fn set_import_data(&mut self, data: impl Into<String>) {
        self.import_data = data.into();
    }

    /// Hex SHA-256 digest of the file content.
    pub fn content_hash(&mut self) -> &str {
        let bytes = self.bytes;
        self.content_hash
            .get_or_insert_with(|| hash_bytes(bytes))
            .as_str()
    }

    pub fn find_asset(&self, guid: &Guid) -> Option<Arc<Asset>> {
        crate::database::resolve(&self.database, guid)
    }

    /// Weak handle to the database for loaders that resolve nested assets.
    pub fn database_ref(&self) -> DatabaseRef {
        self.database.clone()
    }

    pub fn backend<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.backends.get::<T>()
    }

    pub fn report(&mut self, info: AssetInfo) {
        self.reported.push(info);
    }

    pub fn reported(&self) -> &[AssetInfo] {
        &self.reported
    }

    /// Shorthand for an [`AssetError::Import`] about this file.
    pub fn error(&self, message: impl Into<String>) -> AssetError {
        AssetError::import(self.path, message)
    }

    pub(crate) fn finish(self) -> (Vec<AssetInfo>, String) {
        (self.reported, self.import_data)
    }
}

pub(crate) fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Decodes one source file into zero or more assets.
///
/// One importer instance exists per tracked file and lives as long as the
/// file is tracked, so it can keep whatever state it needs to report the
/// same assets again cheaply.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct ClipImporter { guid: Option<Guid> }
///
/// impl AssetImporter for ClipImporter {
///     fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
///         let guid = *self.guid.get_or_insert_with(Guid::generate);
///         let source = cx.source().clone();
///         cx.report(AssetInfo::new(Asset::new(guid, ClipLoader { source })));
///         Ok(())
///     }
/// }
/// ```
pub trait AssetImporter: Any + Send + Sync {
    /// Import the file, reporting every asset it provides.
    ///
    /// Implementations must be idempotent: importing unchanged content
    /// reports the same GUIDs. An error leaves the previously registered
    /// assets of the file untouched.
    fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()>;
}
