//! The file-system backed asset database.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex};
use quarry_core::Guid;
use quarry_core::alloc::{HashMap, HashSet};
use quarry_core::profiling::profile_function;

use crate::asset::Asset;
use crate::backends::Backends;
use crate::cache::{ImportDataCache, modified_millis};
use crate::collection::{AssetCollection, AssetRecord};
use crate::config::{DatabaseConfig, ProgressCallback};
use crate::database::{AssetDatabase, DatabaseRef};
use crate::error::AssetResult;
use crate::event::{ChangeEvents, DatabaseChange, SubscriptionId};
use crate::importer::{AssetImporter, AssetInfo, ImportContext, SourceFile, hash_bytes};
use crate::metadata::{self, ImporterMetadata};
use crate::path_lock::PathLockCache;
use crate::queue::{ImportJob, ImportQueue};
use crate::registry::{Candidate, ErasedSerializer, SerializerRegistry, same_serializer};
use crate::resource::{Resource, ResourceType};
use crate::scan::{FileStamp, RescanSignal, spawn_rescan, walk_files};
#[cfg(feature = "watch")]
use crate::watch::DirectoryWatcher;
use crate::watch::{FileChange, FileChangeKind};
use crate::workers::ImportWorkers;

/// The importer of one tracked file and what it last saw.
struct ReaderInfo {
    serializer: Arc<dyn ErasedSerializer>,
    importer: Box<dyn AssetImporter>,
    source: Arc<SourceFile>,
    stamp: Option<FileStamp>,
    content_hash: String,
}

/// A file every candidate failed on, with the state it failed at.
struct FailedImport {
    stamp: Option<FileStamp>,
    candidates: usize,
}

struct Imported {
    serializer: Arc<dyn ErasedSerializer>,
    importer: Box<dyn AssetImporter>,
    reported: Vec<AssetInfo>,
    token: String,
}

/// State shared by the workers, the rescan thread and the watcher.
struct Shared {
    root: PathBuf,
    registry: Arc<SerializerRegistry>,
    metadata_extension: String,
    backends: Backends,
    cache_file: Option<PathBuf>,
    collection: ReentrantMutex<RefCell<AssetCollection>>,
    readers: Mutex<HashMap<PathBuf, ReaderInfo>>,
    failed: Mutex<HashMap<PathBuf, FailedImport>>,
    path_locks: PathLockCache,
    queue: Arc<ImportQueue>,
    cache: ImportDataCache,
    events: ChangeEvents,
    observer_lock: ReentrantMutex<()>,
    dead: AtomicBool,
    this: DatabaseRef,
}

impl Shared {
    fn with_collection<R>(&self, f: impl FnOnce(&AssetCollection) -> R) -> R {
        let guard = self.collection.lock();
        let collection = guard.borrow();
        f(&collection)
    }

    fn with_collection_mut<R>(&self, f: impl FnOnce(&mut AssetCollection) -> R) -> R {
        let guard = self.collection.lock();
        let mut collection = guard.borrow_mut();
        f(&mut collection)
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Paths the scanner never imports: sidecars, the cache file, and
    /// anything outside the root.
    fn is_ignored(&self, path: &Path) -> bool {
        path == self.root
            || !path.starts_with(&self.root)
            || metadata::is_sidecar(path, &self.metadata_extension)
            || self.cache_file.as_deref() == Some(path)
    }

    fn is_tracked(&self, path: &Path) -> bool {
        let has_reader = self.readers.lock().contains_key(path);
        has_reader || self.with_collection(|c| c.is_tracked(path))
    }

    fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: HashSet<PathBuf> = self.readers.lock().keys().cloned().collect();
        self.with_collection(|c| paths.extend(c.tracked_sources().map(Path::to_path_buf)));
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();
        paths
    }

    /// Tracked files strictly inside `dir`.
    fn tracked_under(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths = self.tracked_paths();
        paths.retain(|path| path.as_path() != dir && path.starts_with(dir));
        paths
    }

    fn queue_path(&self, path: &Path) -> bool {
        let candidates = self.registry.candidates(path);
        if candidates.is_empty() && !self.is_tracked(path) {
            return false;
        }
        self.queue.push(ImportJob {
            path: path.to_path_buf(),
            candidates,
        })
    }

    /// Queue every file under `dir` that is new or changed.
    fn queue_directory(&self, dir: &Path) -> usize {
        walk_files(dir, |path| self.is_ignored(path))
            .iter()
            .filter(|path| self.needs_import(path) && self.queue_path(path))
            .count()
    }

    /// Whether the file on disk differs from what its reader last saw.
    fn needs_import(&self, path: &Path) -> bool {
        let stamp = FileStamp::read(path);
        let candidates = self.registry.candidates(path);

        if let Some(failed) = self.failed.lock().get(path)
            && failed.stamp == stamp
            && failed.candidates == candidates.len()
        {
            return false;
        }

        match self.readers.lock().get(path) {
            Some(reader) => {
                reader.stamp != stamp
                    || !candidates
                        .iter()
                        .any(|c| same_serializer(&c.serializer, &reader.serializer))
            }
            None => !candidates.is_empty(),
        }
    }

    fn read_sidecar(&self, path: &Path) -> Option<ImporterMetadata> {
        match metadata::read(path, &self.metadata_extension) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Ignoring importer settings of '{}': {}", path.display(), e);
                None
            }
        }
    }

    fn run_importer(
        &self,
        importer: &mut dyn AssetImporter,
        source: &Arc<SourceFile>,
        path: &Path,
        bytes: &[u8],
        extension: &str,
        previous_import_data: &str,
    ) -> AssetResult<(Vec<AssetInfo>, String)> {
        let mut cx = ImportContext::new(
            source,
            path,
            bytes,
            extension,
            self.this.clone(),
            &self.backends,
            previous_import_data,
        );
        importer.import(&mut cx)?;
        Ok(cx.finish())
    }

    fn import_file(&self, job: ImportJob) {
        profile_function!();
        let _guard = self.path_locks.lock(&job.path);
        let changes = self.import_locked(&job.path, job.candidates);
        // Observers see a path's changes in the order they were applied.
        self.events.emit(&changes);
    }

    fn import_locked(&self, path: &Path, candidates: Vec<Candidate>) -> Vec<DatabaseChange> {
        if path.is_dir() {
            self.queue_directory(path);
            return Vec::new();
        }
        if !path.is_file() {
            return self.erase_locked(path);
        }
        if candidates.is_empty() {
            if self.is_tracked(path) {
                tracing::debug!("No importer left for '{}'", path.display());
                return self.erase_locked(path);
            }
            return Vec::new();
        }

        let stamp = FileStamp::read(path);
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read '{}': {}", path.display(), e);
                return Vec::new();
            }
        };
        let content_hash = hash_bytes(&bytes);
        let modified = modified_millis(path);
        let previous_import_data = self.cache.take(path, modified);
        tracing::debug!("Importing '{}'", path.display());

        let existing = self.readers.lock().remove(path);
        let content_changed = existing
            .as_ref()
            .is_none_or(|reader| reader.content_hash != content_hash);
        let source = existing
            .as_ref()
            .map(|reader| reader.source.clone())
            .unwrap_or_else(|| SourceFile::new(path));

        let mut imported = None;
        let mut kept = None;
        if let Some(mut reader) = existing {
            let candidate = candidates
                .iter()
                .find(|c| same_serializer(&c.serializer, &reader.serializer));
            match candidate {
                Some(candidate) => match self.run_importer(
                    reader.importer.as_mut(),
                    &source,
                    path,
                    &bytes,
                    &candidate.extension,
                    &previous_import_data,
                ) {
                    Ok((reported, token)) => {
                        imported = Some(Imported {
                            serializer: reader.serializer,
                            importer: reader.importer,
                            reported,
                            token,
                        })
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Importer '{}' failed on '{}': {}",
                            reader.serializer.name(),
                            path.display(),
                            e
                        );
                        kept = Some(reader);
                    }
                },
                None => kept = Some(reader),
            }
        }

        if imported.is_none() {
            imported = self.import_fresh(path, &candidates, kept.as_ref(), &source, &bytes, &previous_import_data);
        }

        let Some(imported) = imported else {
            tracing::warn!(
                "No importer could import '{}'; keeping its previous assets",
                path.display()
            );
            if let Some(reader) = kept {
                self.readers.lock().insert(path.to_path_buf(), reader);
            }
            self.failed.lock().insert(
                path.to_path_buf(),
                FailedImport {
                    stamp,
                    candidates: candidates.len(),
                },
            );
            return Vec::new();
        };

        let Imported {
            serializer,
            importer,
            reported,
            token,
        } = imported;
        let count = reported.len();
        let changes = self.with_collection_mut(|c| c.reconcile(path, &source, reported, content_changed));
        let settings = serializer.read_settings(importer.as_ref());

        self.readers.lock().insert(
            path.to_path_buf(),
            ReaderInfo {
                serializer: serializer.clone(),
                importer,
                source,
                stamp,
                content_hash,
            },
        );
        self.failed.lock().remove(path);
        self.cache.store(path, modified, token);

        match settings {
            Ok(Some(settings)) => {
                let sidecar = ImporterMetadata {
                    importer: serializer.name().to_string(),
                    settings,
                };
                if let Err(e) = metadata::write_if_changed(path, &self.metadata_extension, &sidecar) {
                    tracing::warn!("Failed to write importer settings of '{}': {}", path.display(), e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to serialize importer settings of '{}': {}", path.display(), e),
        }

        tracing::debug!(
            "Imported '{}' with '{}': {} assets, {} changes",
            path.display(),
            serializer.name(),
            count,
            changes.len()
        );
        changes
    }

    /// Try new importers in order, the one named by the sidecar first.
    fn import_fresh(
        &self,
        path: &Path,
        candidates: &[Candidate],
        already_tried: Option<&ReaderInfo>,
        source: &Arc<SourceFile>,
        bytes: &[u8],
        previous_import_data: &str,
    ) -> Option<Imported> {
        let sidecar = self.read_sidecar(path);
        let named = |c: &&Candidate| {
            sidecar
                .as_ref()
                .is_some_and(|s| s.importer == c.serializer.name())
        };
        let ordered = candidates
            .iter()
            .filter(named)
            .chain(candidates.iter().filter(|c| !named(c)));

        for candidate in ordered {
            if already_tried.is_some_and(|reader| same_serializer(&reader.serializer, &candidate.serializer)) {
                continue;
            }
            let serializer = &candidate.serializer;
            let mut importer = serializer.create_importer();
            if let Some(sidecar) = &sidecar
                && sidecar.importer == serializer.name()
                && let Err(e) = serializer.apply_settings(importer.as_mut(), sidecar.settings.clone())
            {
                tracing::warn!("Failed to apply importer settings of '{}': {}", path.display(), e);
            }

            match self.run_importer(
                importer.as_mut(),
                source,
                path,
                bytes,
                &candidate.extension,
                previous_import_data,
            ) {
                Ok((reported, token)) => {
                    return Some(Imported {
                        serializer: serializer.clone(),
                        importer,
                        reported,
                        token,
                    });
                }
                Err(e) => tracing::warn!(
                    "Importer '{}' failed on '{}': {}",
                    serializer.name(),
                    path.display(),
                    e
                ),
            }
        }
        None
    }

    /// Drop the importer and every record of `path`. Caller holds its lock.
    fn erase_locked(&self, path: &Path) -> Vec<DatabaseChange> {
        let reader = self.readers.lock().remove(path);
        let removed = self.with_collection_mut(|c| c.remove_source(path));
        self.failed.lock().remove(path);
        self.cache.remove(path);
        if reader.is_none() && removed.is_empty() {
            return Vec::new();
        }

        if let Some(reader) = &reader {
            reader.source.invalidate();
        }
        for record in &removed {
            record.source().invalidate();
        }
        if let Err(e) = metadata::remove(path, &self.metadata_extension) {
            tracing::warn!("Failed to remove importer settings of '{}': {}", path.display(), e);
        }

        tracing::debug!("Erased '{}' ({} assets)", path.display(), removed.len());
        removed
            .iter()
            .map(|record| DatabaseChange::deleted(record.guid()))
            .collect()
    }

    fn file_created(&self, path: &Path) {
        if self.is_ignored(path) {
            return;
        }
        if path.is_dir() {
            let queued = self.queue_directory(path);
            tracing::debug!("Queued {} files under '{}'", queued, path.display());
        } else if path.is_file() {
            self.queue_path(path);
        } else {
            self.file_erased(path);
        }
    }

    /// Erase a file, or every tracked file under a directory.
    fn file_erased(&self, path: &Path) {
        let mut targets = self.tracked_under(path);
        targets.push(path.to_path_buf());

        for target in targets {
            let recreated = {
                let _guard = self.path_locks.lock(&target);
                if target.exists() {
                    true
                } else {
                    let changes = self.erase_locked(&target);
                    self.events.emit(&changes);
                    false
                }
            };
            if recreated {
                self.queue_path(&target);
            }
        }
    }

    fn file_renamed(&self, old: &Path, new: &Path) {
        if old == new || self.is_ignored(old) {
            self.file_created(new);
            return;
        }
        if self.is_ignored(new) {
            self.file_erased(old);
            return;
        }

        if self.is_tracked(old) {
            self.rename_tracked(old, new);
            return;
        }

        let moved = self.tracked_under(old);
        for path in &moved {
            if let Ok(relative) = path.strip_prefix(old) {
                self.rename_tracked(path, &new.join(relative));
            }
        }
        if !moved.is_empty() {
            tracing::debug!(
                "Moved {} tracked files from '{}' to '{}'",
                moved.len(),
                old.display(),
                new.display()
            );
        }
        self.file_created(new);
    }

    /// Move one tracked file's importer and records without re-importing.
    fn rename_tracked(&self, old: &Path, new: &Path) {
        let reimport = {
            let _guards = self.path_locks.lock_pair(old, new);

            let reader = self.readers.lock().remove(old);
            let displaced = self.readers.lock().remove(new);
            if let Some(displaced) = &displaced {
                displaced.source.invalidate();
                if let Err(e) = metadata::remove(new, &self.metadata_extension) {
                    tracing::warn!("Failed to remove importer settings of '{}': {}", new.display(), e);
                }
            }

            let changes = self.with_collection_mut(|c| c.rename_source(old, new));
            self.cache.remove(new);
            self.cache.rename(old, new);
            {
                let mut failed = self.failed.lock();
                failed.remove(old);
                failed.remove(new);
            }
            if let Err(e) = metadata::rename(old, new, &self.metadata_extension) {
                tracing::warn!("Failed to move importer settings of '{}': {}", old.display(), e);
            }

            let reimport = match reader {
                Some(reader) => {
                    reader.source.set_path(new.to_path_buf());
                    let still_candidate = self
                        .registry
                        .candidates(new)
                        .iter()
                        .any(|c| same_serializer(&c.serializer, &reader.serializer));
                    let changed_on_disk = reader.stamp != FileStamp::read(new);
                    self.readers.lock().insert(new.to_path_buf(), reader);
                    !still_candidate || changed_on_disk
                }
                None => true,
            };
            tracing::debug!("Renamed '{}' to '{}'", old.display(), new.display());
            self.events.emit(&changes);
            reimport
        };

        if reimport {
            self.queue_path(new);
        }
    }

    fn on_file_changed(&self, change: FileChange) {
        if self.is_dead() {
            return;
        }
        let _observer = self.observer_lock.lock();
        let path = self.resolve(&change.path);
        match (change.kind, change.old_path) {
            (FileChangeKind::Created | FileChangeKind::Changed, _) => self.file_created(&path),
            (FileChangeKind::Deleted, _) => {
                if !self.is_ignored(&path) {
                    self.file_erased(&path);
                }
            }
            (FileChangeKind::Renamed, Some(old)) => self.file_renamed(&self.resolve(&old), &path),
            (FileChangeKind::Renamed, None) => self.file_created(&path),
        }
    }

    /// Walk the whole tree: queue new and changed files, erase vanished
    /// ones. Returns the number of files queued.
    fn rescan(&self, signal: Option<&RescanSignal>, file_delay: Duration) -> usize {
        profile_function!();
        let files = walk_files(&self.root, |path| self.is_ignored(path));
        let mut queued = 0;
        for path in &files {
            if self.is_dead() {
                return queued;
            }
            if self.needs_import(path) && self.queue_path(path) {
                queued += 1;
            }
            if let Some(signal) = signal
                && !file_delay.is_zero()
                && signal.wait(file_delay)
            {
                return queued;
            }
        }

        let on_disk: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
        for path in self.tracked_paths() {
            if !on_disk.contains(path.as_path()) && !path.is_file() {
                self.file_erased(&path);
            }
        }
        if queued > 0 {
            tracing::debug!("Rescan queued {} files", queued);
        }
        queued
    }

    fn initial_scan(&self, progress: Option<&ProgressCallback>) {
        profile_function!();
        let started = Instant::now();
        let baseline = self.queue.completed();
        let total = walk_files(&self.root, |path| self.is_ignored(path))
            .iter()
            .filter(|path| self.queue_path(path))
            .count();
        tracing::info!("Initial scan of '{}' found {} files to import", self.root.display(), total);

        match progress {
            Some(progress) => self.queue.wait_idle_with(|completed| {
                let done = completed.saturating_sub(baseline) as usize;
                progress(done.min(total), total);
            }),
            None => self.queue.wait_idle(),
        }

        tracing::info!(
            "Imported {} assets from {} files in {:.2?}",
            self.with_collection(AssetCollection::len),
            total,
            started.elapsed()
        );
    }
}

impl AssetDatabase for Shared {
    fn find_asset(&self, guid: &Guid) -> Option<Arc<Asset>> {
        self.with_collection(|c| c.get(guid).map(|record| record.asset().clone()))
    }
}

/// An asset database backed by a directory tree.
///
/// Construction scans the directory and imports every file with a
/// registered importer before returning. Afterwards the database follows
/// changes through the built-in watcher, [`FileSystemDatabase::on_file_changed`],
/// and a periodic safety-net rescan.
///
/// Query callbacks run while the collection lock is held. They must not
/// call [`Asset::load`] on the reported assets; collect the assets and load
/// them after the query returns.
pub struct FileSystemDatabase {
    shared: Arc<Shared>,
    workers: ImportWorkers,
    rescan_signal: Arc<RescanSignal>,
    rescan: Option<JoinHandle<()>>,
    #[cfg(feature = "watch")]
    watcher: Mutex<Option<DirectoryWatcher>>,
}

impl FileSystemDatabase {
    /// Open `config.asset_directory` and import everything in it.
    ///
    /// Fails only if the configuration is unusable or the root directory
    /// cannot be opened. Individual import failures are logged.
    pub fn new(config: DatabaseConfig, registry: Arc<SerializerRegistry>) -> AssetResult<Self> {
        profile_function!();
        let config = config.normalized()?;
        let root = config.canonical_root()?;
        let thread_count = config.thread_count();
        tracing::info!(
            "Opening asset database at '{}' with {} import threads",
            root.display(),
            thread_count
        );

        let cache_file = config
            .previous_import_data_cache
            .as_deref()
            .map(absolute_path);
        let shared = Arc::new_cyclic(|this: &Weak<Shared>| {
            let this: DatabaseRef = this.clone();
            Shared {
                root,
                registry,
                metadata_extension: config.metadata_extension.clone(),
                backends: config.backends.clone(),
                cache: ImportDataCache::load(cache_file.clone()),
                cache_file,
                collection: ReentrantMutex::new(RefCell::new(AssetCollection::new())),
                readers: Mutex::new(HashMap::new()),
                failed: Mutex::new(HashMap::new()),
                path_locks: PathLockCache::new(),
                queue: Arc::new(ImportQueue::new()),
                events: ChangeEvents::new(),
                observer_lock: ReentrantMutex::new(()),
                dead: AtomicBool::new(false),
                this,
            }
        });

        let worker_shared = shared.clone();
        let workers = ImportWorkers::spawn(thread_count, shared.queue.clone(), move |job| {
            worker_shared.import_file(job)
        })?;

        let mut database = Self {
            shared,
            workers,
            rescan_signal: Arc::new(RescanSignal::new()),
            rescan: None,
            #[cfg(feature = "watch")]
            watcher: Mutex::new(None),
        };

        // Watch first so nothing that changes during the scan is missed.
        #[cfg(feature = "watch")]
        if config.watch {
            let weak = Arc::downgrade(&database.shared);
            let watcher = DirectoryWatcher::new(&database.shared.root, config.watch_debounce, move |change| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_file_changed(change);
                }
            })?;
            *database.watcher.lock() = Some(watcher);
        }
        #[cfg(not(feature = "watch"))]
        if config.watch {
            tracing::debug!("Built without the 'watch' feature; not watching '{}'", database.root().display());
        }

        database
            .shared
            .initial_scan(config.report_import_progress.as_ref());

        if let Some(interval) = config.rescan_interval {
            let shared = database.shared.clone();
            let file_delay = config.rescan_file_delay;
            database.rescan = Some(spawn_rescan(
                database.rescan_signal.clone(),
                interval,
                move |signal| {
                    shared.rescan(Some(signal), file_delay);
                },
            )?);
        }

        Ok(database)
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn registry(&self) -> &Arc<SerializerRegistry> {
        &self.shared.registry
    }

    pub fn thread_count(&self) -> usize {
        self.workers.thread_count()
    }

    /// Weak handle for assets that resolve other assets when loading.
    pub fn database_ref(&self) -> DatabaseRef {
        self.shared.this.clone()
    }

    pub fn asset_count(&self) -> usize {
        self.shared.with_collection(AssetCollection::len)
    }

    pub fn find_asset(&self, guid: &Guid) -> Option<Arc<Asset>> {
        self.shared.find_asset(guid)
    }

    /// Snapshot of the record of `guid`.
    pub fn try_get_asset_info(&self, guid: &Guid) -> Option<AssetRecord> {
        self.shared.with_collection(|c| c.get(guid).cloned())
    }

    /// Snapshot of the record of `asset`, if this exact asset is registered.
    pub fn try_get_asset_info_for(&self, asset: &Asset) -> Option<AssetRecord> {
        self.shared.with_collection(|c| {
            c.get(&asset.guid())
                .filter(|record| std::ptr::eq(record.asset().as_ref(), asset))
                .cloned()
        })
    }

    /// Visit every record of `resource_type`, or of its subtypes unless
    /// `exact_type` is set.
    pub fn get_assets_of_type(
        &self,
        resource_type: &ResourceType,
        exact_type: bool,
        f: impl FnMut(&AssetRecord),
    ) {
        self.shared
            .with_collection(|c| c.for_each_of_type(resource_type.name(), exact_type, f));
    }

    /// Assets of type `T`, collected so they can be loaded safely.
    pub fn assets_of_type<T: Resource>(&self, exact_type: bool) -> Vec<Arc<Asset>> {
        let mut assets = Vec::new();
        self.get_assets_of_type(&ResourceType::of::<T>(), exact_type, |record| {
            assets.push(record.asset().clone())
        });
        assets
    }

    /// Visit records whose name contains `name`, or equals it with
    /// `exact_name`.
    pub fn get_assets_by_name(
        &self,
        name: &str,
        exact_name: bool,
        resource_type: &ResourceType,
        exact_type: bool,
        f: impl FnMut(&AssetRecord),
    ) {
        self.shared.with_collection(|c| {
            c.for_each_by_name(name, exact_name, resource_type.name(), exact_type, f)
        });
    }

    /// Visit the records produced by `path`, in the order its importer
    /// reported them. Relative paths are resolved against the root.
    pub fn get_assets_from_file(
        &self,
        path: impl AsRef<Path>,
        resource_type: &ResourceType,
        exact_type: bool,
        mut f: impl FnMut(&AssetRecord),
    ) {
        let path = self.shared.resolve(path.as_ref());
        self.shared.with_collection(|c| {
            for record in c.records_from_source(&path, resource_type.name(), exact_type) {
                f(record);
            }
        });
    }

    /// Observe every record change. Callbacks run on import threads.
    ///
    /// Changes of one file arrive in the order they were applied; the file
    /// stays locked until every observer has returned, so a callback must
    /// not wait for further changes of that same file.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&DatabaseChange) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(observer)
    }

    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<DatabaseChange>) {
        self.shared.events.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.events.observer_count()
    }

    /// Feed a change from an external directory observer.
    pub fn on_file_changed(&self, change: FileChange) {
        self.shared.on_file_changed(change);
    }

    /// Queue one file for import. Returns `false` if it is ignored, has no
    /// importer, or is already queued.
    pub fn queue_file(&self, path: impl AsRef<Path>) -> bool {
        let path = self.shared.resolve(path.as_ref());
        !self.shared.is_ignored(&path) && self.shared.queue_path(&path)
    }

    /// Run a full rescan now. Returns the number of files queued.
    pub fn rescan_now(&self) -> usize {
        self.shared.rescan(None, Duration::ZERO)
    }

    pub fn is_idle(&self) -> bool {
        self.shared.queue.is_idle()
    }

    /// Files waiting for a worker, not counting running imports.
    pub fn pending_imports(&self) -> usize {
        self.shared.queue.len()
    }

    /// Block until no import is queued or running.
    pub fn wait_until_idle(&self) {
        self.shared.queue.wait_idle();
    }

    /// Like [`FileSystemDatabase::wait_until_idle`] with a deadline.
    /// Returns `true` if the queue drained in time.
    pub fn wait_until_idle_timeout(&self, timeout: Duration) -> bool {
        self.shared.queue.wait_idle_timeout(timeout)
    }

    /// Check the internal indices for consistency.
    pub fn verify_indices(&self) -> Result<(), String> {
        self.shared.with_collection(AssetCollection::verify_indices)
    }
}

impl AssetDatabase for FileSystemDatabase {
    fn find_asset(&self, guid: &Guid) -> Option<Arc<Asset>> {
        self.shared.find_asset(guid)
    }
}

impl Drop for FileSystemDatabase {
    fn drop(&mut self) {
        profile_function!();
        #[cfg(feature = "watch")]
        {
            self.watcher.lock().take();
        }
        self.shared.dead.store(true, Ordering::Release);

        self.rescan_signal.kill();
        if let Some(handle) = self.rescan.take()
            && handle.join().is_err()
        {
            tracing::error!("Rescan thread panicked");
        }

        self.workers.shutdown();

        match self.shared.cache.save() {
            Ok(true) => tracing::debug!("Saved previous import data"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to save previous import data: {}", e),
        }
        tracing::debug!("Closed asset database at '{}'", self.shared.root.display());
    }
}

/// Absolute form of a path that may not exist yet, canonical where the
/// parent directory exists.
fn absolute_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let canonical = absolute
        .parent()
        .zip(absolute.file_name())
        .and_then(|(dir, name)| dir.canonicalize().ok().map(|dir| dir.join(name)));
    canonical.unwrap_or(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::registry::ImporterSerializer;

    struct Note;
    impl Resource for Note {
        fn type_name() -> &'static str {
            "Note"
        }
    }

    /// Reports one asset per file; the GUID survives in settings.
    #[derive(Default)]
    struct NoteImporter {
        guid: Option<Guid>,
        asset: Option<Arc<Asset>>,
    }

    impl AssetImporter for NoteImporter {
        fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
            if cx.bytes().starts_with(b"!") {
                return Err(cx.error("bang"));
            }
            let guid = *self.guid.get_or_insert_with(Guid::generate);
            let asset = self
                .asset
                .get_or_insert_with(|| Asset::from_fn(guid, |_| Ok(Note)))
                .clone();
            cx.report(AssetInfo::new(asset));
            Ok(())
        }
    }

    #[derive(Default, serde::Serialize, serde::Deserialize)]
    struct NoteSettings {
        guid: Option<Guid>,
    }

    struct NoteSerializer;
    impl ImporterSerializer for NoteSerializer {
        type Importer = NoteImporter;
        type Settings = NoteSettings;

        fn name(&self) -> &str {
            "note"
        }
        fn extensions(&self) -> &[&str] {
            &["note"]
        }
        fn create_importer(&self) -> NoteImporter {
            NoteImporter::default()
        }
        fn settings(&self, importer: &NoteImporter) -> NoteSettings {
            NoteSettings { guid: importer.guid }
        }
        fn apply_settings(&self, importer: &mut NoteImporter, settings: NoteSettings) {
            importer.guid = settings.guid;
        }
    }

    fn open(dir: &Path) -> FileSystemDatabase {
        let registry = Arc::new(SerializerRegistry::new());
        registry.register(NoteSerializer);
        let config = DatabaseConfig::new(dir)
            .with_import_threads(2)
            .with_rescan_interval(None)
            .with_watch(false);
        FileSystemDatabase::new(config, registry).unwrap()
    }

    #[test]
    fn test_invalid_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new(dir.path().join("missing")).with_watch(false);
        let result = FileSystemDatabase::new(config, Arc::new(SerializerRegistry::new()));
        assert!(matches!(result, Err(AssetError::InvalidRoot { .. })));
    }

    #[test]
    fn test_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        let database = open(dir.path());
        let root = database.root().to_path_buf();

        assert!(database.shared.is_ignored(&root));
        assert!(database.shared.is_ignored(Path::new("/elsewhere/a.note")));
        assert!(database.shared.is_ignored(&root.join("a.note.jado")));
        assert!(!database.shared.is_ignored(&root.join("a.note")));
    }

    #[test]
    fn test_import_writes_sidecar_and_failure_keeps_assets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.note"), b"hello").unwrap();
        let database = open(dir.path());
        let path = database.root().join("a.note");

        assert_eq!(database.asset_count(), 1);
        let sidecar = metadata::read(&path, ".jado").unwrap().unwrap();
        assert_eq!(sidecar.importer, "note");

        let mut guid = None;
        database.get_assets_from_file("a.note", &ResourceType::of::<Note>(), true, |record| {
            guid = Some(record.guid());
        });
        let guid = guid.unwrap();

        fs::write(&path, b"!broken").unwrap();
        assert!(database.queue_file(&path));
        database.wait_until_idle();
        assert!(database.find_asset(&guid).is_some());

        // The failure is remembered until the file changes again.
        assert!(!database.shared.needs_import(&path));
        database.verify_indices().unwrap();
    }

    #[test]
    fn test_is_tracked_does_not_hold_readers_while_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let database = open(dir.path());
        let shared = &database.shared;
        let missing = database.root().join("missing.note");
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                shared.with_collection(|_| {
                    locked_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                });
            });
            locked_rx.recv().unwrap();

            let lookup = scope.spawn(|| shared.is_tracked(&missing));
            std::thread::sleep(Duration::from_millis(100));

            // The lookup is parked on the collection; the reader map stays free.
            let readers = shared.readers.try_lock_for(Duration::from_secs(1));
            assert!(readers.is_some());
            drop(readers);

            release_tx.send(()).unwrap();
            assert!(!lookup.join().unwrap());
        });
    }

    #[test]
    fn test_erase_unknown_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let database = open(dir.path());
        let (_, events) = database.subscribe_channel();
        database.on_file_changed(FileChange::deleted(database.root().join("nothing.note")));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_absolute_path_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = absolute_path(&dir.path().join("cache.json"));
        assert!(path.is_absolute());
        assert_eq!(path.file_name().unwrap(), "cache.json");
    }
}
