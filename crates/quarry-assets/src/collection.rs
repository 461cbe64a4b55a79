//! The in-memory asset index.
//!
//! [`AssetCollection`] owns one [`AssetRecord`] per live GUID and keeps, for
//! every resource type name, the full record set, a substring name index and
//! a source-path index. A record is present in the indices of its own type
//! and of every ancestor type, and removing it clears all of them.
//!
//! The collection itself is not synchronized; the database guards it.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quarry_core::Guid;
use quarry_core::alloc::{HashMap, HashSet};
use quarry_core::profiling::profile_function;

use crate::asset::Asset;
use crate::event::DatabaseChange;
use crate::importer::{AssetInfo, SourceFile, file_stem};
use crate::resource::ROOT_RESOURCE_TYPE;

/// Longest name substring stored in the name index, in characters.
pub const NAME_KEY_LEN: usize = 16;

/// Everything the database knows about one asset.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    asset: Arc<Asset>,
    resource_name: String,
    name_from_source: bool,
    source_path: PathBuf,
    source: Arc<SourceFile>,
    type_name: String,
    ancestry: BTreeSet<String>,
    importer_index: usize,
}

impl AssetRecord {
    fn new(info: AssetInfo, path: &Path, source: &Arc<SourceFile>, importer_index: usize) -> Self {
        let resource_type = info.asset.resource_type();
        let (resource_name, name_from_source) = match info.resource_name {
            Some(name) => (name, false),
            None => (file_stem(path), true),
        };
        Self {
            resource_name,
            name_from_source,
            source_path: path.to_path_buf(),
            source: source.clone(),
            type_name: resource_type.name().to_string(),
            ancestry: resource_type.ancestry(),
            importer_index,
            asset: info.asset,
        }
    }

    pub fn guid(&self) -> Guid {
        self.asset.guid()
    }

    pub fn asset(&self) -> &Arc<Asset> {
        &self.asset
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Whether the name was derived from the source file name.
    pub fn name_from_source(&self) -> bool {
        self.name_from_source
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Shared handle of the file that produced this record.
    pub fn source(&self) -> &Arc<SourceFile> {
        &self.source
    }

    /// Leaf resource type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Leaf type plus every ancestor type name, root included.
    pub fn ancestry(&self) -> &BTreeSet<String> {
        &self.ancestry
    }

    /// Position of this asset in its importer's report.
    pub fn importer_index(&self) -> usize {
        self.importer_index
    }

    fn matches_type(&self, type_name: &str, exact: bool) -> bool {
        if exact {
            self.type_name == type_name
        } else {
            self.ancestry.contains(type_name)
        }
    }

    fn same_as(&self, other: &AssetRecord) -> bool {
        Arc::ptr_eq(&self.asset, &other.asset)
            && self.resource_name == other.resource_name
            && self.name_from_source == other.name_from_source
            && self.source_path == other.source_path
            && self.type_name == other.type_name
            && self.ancestry == other.ancestry
            && self.importer_index == other.importer_index
    }
}

#[derive(Default)]
struct TypeIndex {
    all: HashSet<Guid>,
    by_name: HashMap<String, HashSet<Guid>>,
    by_path: HashMap<PathBuf, HashSet<Guid>>,
}

/// Byte ranges of every substring of `name` up to [`NAME_KEY_LEN`] chars.
fn name_keys(name: &str) -> HashSet<&str> {
    let bounds: Vec<usize> = name
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(name.len()))
        .collect();
    let chars = bounds.len() - 1;

    let mut keys = HashSet::new();
    for start in 0..chars {
        let last = (start + NAME_KEY_LEN).min(chars);
        for end in (start + 1)..=last {
            keys.insert(&name[bounds[start]..bounds[end]]);
        }
    }
    keys
}

/// The longest prefix of `query` that can be an index key.
fn lookup_key(query: &str) -> &str {
    match query.char_indices().nth(NAME_KEY_LEN) {
        Some((end, _)) => &query[..end],
        None => query,
    }
}

fn remove_from<K, Q>(map: &mut HashMap<K, HashSet<Guid>>, key: &Q, guid: &Guid)
where
    K: Borrow<Q> + Hash + Eq,
    Q: Hash + Eq + ?Sized,
{
    if let Some(set) = map.get_mut(key) {
        set.remove(guid);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

/// GUID, type, name and path indices over every asset in the database.
#[derive(Default)]
pub struct AssetCollection {
    records: HashMap<Guid, AssetRecord>,
    types: HashMap<String, TypeIndex>,
    /// GUIDs reported by each source file, in report order.
    sources: HashMap<PathBuf, Vec<Guid>>,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, guid: &Guid) -> Option<&AssetRecord> {
        self.records.get(guid)
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.records.contains_key(guid)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.sources.contains_key(path)
    }

    /// GUIDs reported by `path`, in report order.
    pub fn guids_from_source(&self, path: &Path) -> &[Guid] {
        self.sources.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn tracked_sources(&self) -> impl Iterator<Item = &Path> {
        self.sources.keys().map(PathBuf::as_path)
    }

    /// Tracked files strictly inside `dir`.
    pub fn sources_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.sources
            .keys()
            .filter(|path| path.as_path() != dir && path.starts_with(dir))
            .cloned()
            .collect()
    }

    fn index(&mut self, record: &AssetRecord) {
        let guid = record.guid();
        let keys = name_keys(&record.resource_name);
        for type_name in &record.ancestry {
            let index = self.types.entry(type_name.clone()).or_default();
            index.all.insert(guid);
            for key in &keys {
                index
                    .by_name
                    .entry((*key).to_string())
                    .or_default()
                    .insert(guid);
            }
            index
                .by_path
                .entry(record.source_path.clone())
                .or_default()
                .insert(guid);
        }
    }

    fn unindex(&mut self, record: &AssetRecord) {
        let guid = record.guid();
        let keys = name_keys(&record.resource_name);
        for type_name in &record.ancestry {
            let Some(index) = self.types.get_mut(type_name) else {
                continue;
            };
            index.all.remove(&guid);
            for key in &keys {
                remove_from(&mut index.by_name, *key, &guid);
            }
            remove_from(&mut index.by_path, record.source_path.as_path(), &guid);
            if index.all.is_empty() {
                self.types.remove(type_name);
            }
        }
    }

    fn forget_source_entry(&mut self, path: &Path, guid: &Guid) {
        if let Some(list) = self.sources.get_mut(path) {
            list.retain(|g| g != guid);
            if list.is_empty() {
                self.sources.remove(path);
            }
        }
    }

    /// Remove one record from every index.
    pub fn remove(&mut self, guid: &Guid) -> Option<AssetRecord> {
        let record = self.records.remove(guid)?;
        self.unindex(&record);
        self.forget_source_entry(&record.source_path, guid);
        Some(record)
    }

    /// Replace the records of `path` with a fresh importer report.
    ///
    /// GUIDs seen before are updated in place and reported as modified when
    /// `content_changed` is set or the record itself differs. New GUIDs are
    /// created and GUIDs missing from the report are deleted. A GUID that
    /// another file owned is taken over.
    pub fn reconcile(
        &mut self,
        path: &Path,
        source: &Arc<SourceFile>,
        reported: Vec<AssetInfo>,
        content_changed: bool,
    ) -> Vec<DatabaseChange> {
        profile_function!();
        let previous = self.sources.remove(path).unwrap_or_default();
        let mut order: Vec<Guid> = Vec::with_capacity(reported.len());
        let mut seen = HashSet::with_capacity(reported.len());
        let mut changes = Vec::new();

        for info in reported {
            let guid = info.asset.guid();
            if !seen.insert(guid) {
                tracing::warn!(
                    "'{}' reported asset {} more than once; keeping the first",
                    path.display(),
                    guid
                );
                continue;
            }

            let record = AssetRecord::new(info, path, source, order.len());
            match self.records.remove(&guid) {
                Some(old) => {
                    let owned_here = old.source_path == path;
                    if !owned_here {
                        tracing::warn!(
                            "Asset {} moved from '{}' to '{}'",
                            guid,
                            old.source_path.display(),
                            path.display()
                        );
                        self.forget_source_entry(&old.source_path, &guid);
                    }
                    let unchanged = owned_here && old.same_as(&record);
                    if !unchanged {
                        self.unindex(&old);
                        self.index(&record);
                    }
                    if content_changed || !unchanged {
                        changes.push(DatabaseChange::modified(guid));
                    }
                }
                None => {
                    self.index(&record);
                    changes.push(DatabaseChange::created(guid));
                }
            }
            self.records.insert(guid, record);
            order.push(guid);
        }

        for guid in previous {
            if seen.contains(&guid) {
                continue;
            }
            let still_ours = self
                .records
                .get(&guid)
                .is_some_and(|record| record.source_path == path);
            if still_ours && let Some(old) = self.records.remove(&guid) {
                self.unindex(&old);
                changes.push(DatabaseChange::deleted(guid));
            }
        }

        if !order.is_empty() {
            self.sources.insert(path.to_path_buf(), order);
        }
        changes
    }

    /// Remove every record produced by `path`.
    pub fn remove_source(&mut self, path: &Path) -> Vec<AssetRecord> {
        let Some(guids) = self.sources.remove(path) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(guids.len());
        for guid in guids {
            if let Some(record) = self.records.remove(&guid) {
                self.unindex(&record);
                removed.push(record);
            }
        }
        removed
    }

    /// Move the records of `old` to `new` without re-importing.
    ///
    /// GUIDs are preserved. Names derived from the file name follow the new
    /// name and are reported as modified. Records already at `new` are
    /// deleted first.
    pub fn rename_source(&mut self, old: &Path, new: &Path) -> Vec<DatabaseChange> {
        if old == new {
            return Vec::new();
        }
        let mut changes: Vec<DatabaseChange> = self
            .remove_source(new)
            .iter()
            .map(|record| DatabaseChange::deleted(record.guid()))
            .collect();

        let Some(guids) = self.sources.remove(old) else {
            return changes;
        };
        for guid in &guids {
            let Some(mut record) = self.records.remove(guid) else {
                continue;
            };
            self.unindex(&record);
            record.source_path = new.to_path_buf();
            if record.name_from_source {
                let name = file_stem(new);
                if name != record.resource_name {
                    record.resource_name = name;
                    changes.push(DatabaseChange::modified(*guid));
                }
            }
            self.index(&record);
            self.records.insert(*guid, record);
        }
        self.sources.insert(new.to_path_buf(), guids);
        changes
    }

    fn type_index(&self, type_name: &str) -> Option<&TypeIndex> {
        self.types.get(type_name)
    }

    /// Visit every record of `type_name`. With `exact`, only records whose
    /// leaf type is `type_name`.
    pub fn for_each_of_type(&self, type_name: &str, exact: bool, mut f: impl FnMut(&AssetRecord)) {
        let Some(index) = self.type_index(type_name) else {
            return;
        };
        for guid in &index.all {
            if let Some(record) = self.records.get(guid)
                && record.matches_type(type_name, exact)
            {
                f(record);
            }
        }
    }

    /// Visit records of `type_name` whose name contains `name`, or equals it
    /// with `exact_name`.
    pub fn for_each_by_name(
        &self,
        name: &str,
        exact_name: bool,
        type_name: &str,
        exact_type: bool,
        mut f: impl FnMut(&AssetRecord),
    ) {
        let Some(index) = self.type_index(type_name) else {
            return;
        };
        let matches = |record: &AssetRecord| {
            record.matches_type(type_name, exact_type)
                && if exact_name {
                    record.resource_name == name
                } else {
                    record.resource_name.contains(name)
                }
        };

        let guids = if name.is_empty() {
            Some(&index.all)
        } else {
            index.by_name.get(lookup_key(name))
        };
        for guid in guids.into_iter().flatten() {
            if let Some(record) = self.records.get(guid)
                && matches(record)
            {
                f(record);
            }
        }
    }

    /// Records of `type_name` produced by `path`, in report order.
    pub fn records_from_source(&self, path: &Path, type_name: &str, exact: bool) -> Vec<&AssetRecord> {
        let Some(guids) = self
            .type_index(type_name)
            .and_then(|index| index.by_path.get(path))
        else {
            return Vec::new();
        };
        let mut records: Vec<&AssetRecord> = guids
            .iter()
            .filter_map(|guid| self.records.get(guid))
            .filter(|record| record.matches_type(type_name, exact))
            .collect();
        records.sort_by_key(|record| record.importer_index);
        records
    }

    /// Check that every index agrees with the record table.
    pub fn verify_indices(&self) -> Result<(), String> {
        let mut indexed = 0usize;
        for (type_name, index) in &self.types {
            for guid in &index.all {
                let record = self
                    .records
                    .get(guid)
                    .ok_or_else(|| format!("type '{}' lists missing asset {}", type_name, guid))?;
                if !record.ancestry.contains(type_name) {
                    return Err(format!("asset {} indexed under foreign type '{}'", guid, type_name));
                }
            }
            for (key, guids) in &index.by_name {
                for guid in guids {
                    let record = self
                        .records
                        .get(guid)
                        .ok_or_else(|| format!("name key '{}' lists missing asset {}", key, guid))?;
                    if !record.resource_name.contains(key.as_str()) {
                        return Err(format!("stale name key '{}' for asset {}", key, guid));
                    }
                }
            }
            for (path, guids) in &index.by_path {
                for guid in guids {
                    let record = self.records.get(guid).ok_or_else(|| {
                        format!("path '{}' lists missing asset {}", path.display(), guid)
                    })?;
                    if record.source_path != *path {
                        return Err(format!("stale path entry for asset {}", guid));
                    }
                }
            }
            if type_name == ROOT_RESOURCE_TYPE {
                indexed = index.all.len();
            }
        }
        if indexed != self.records.len() {
            return Err(format!(
                "{} records but {} in the root index",
                self.records.len(),
                indexed
            ));
        }

        let listed: usize = self.sources.values().map(Vec::len).sum();
        if listed != self.records.len() {
            return Err(format!(
                "{} records but {} listed by source files",
                self.records.len(),
                listed
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AssetChangeKind;
    use crate::resource::{Resource, ResourceType};

    struct Texture;
    impl Resource for Texture {
        fn type_name() -> &'static str {
            "Texture"
        }
    }

    struct Cubemap;
    impl Resource for Cubemap {
        fn type_name() -> &'static str {
            "Cubemap"
        }
        fn parent_types() -> Vec<ResourceType> {
            vec![ResourceType::of::<Texture>()]
        }
    }

    struct Sound;
    impl Resource for Sound {
        fn type_name() -> &'static str {
            "Sound"
        }
    }

    fn texture(guid: Guid) -> Arc<Asset> {
        Asset::from_fn(guid, |_| Ok(Texture))
    }

    fn cubemap(guid: Guid) -> Arc<Asset> {
        Asset::from_fn(guid, |_| Ok(Cubemap))
    }

    fn kinds(changes: &[DatabaseChange]) -> Vec<AssetChangeKind> {
        changes.iter().map(|c| c.kind).collect()
    }

    fn names_of(collection: &AssetCollection, type_name: &str, exact: bool) -> Vec<String> {
        let mut names = Vec::new();
        collection.for_each_of_type(type_name, exact, |r| names.push(r.resource_name().to_string()));
        names.sort();
        names
    }

    #[test]
    fn test_name_keys_bounded() {
        let keys = name_keys("abc");
        assert_eq!(keys.len(), 6);
        assert!(keys.contains("bc"));

        let long = "x".repeat(40);
        assert!(name_keys(&long).iter().all(|k| k.chars().count() <= NAME_KEY_LEN));
        assert!(name_keys("").is_empty());

        let unicode = name_keys("héllo");
        assert!(unicode.contains("él"));
    }

    #[test]
    fn test_reconcile_create_modify_delete() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/walls.tex");
        let source = SourceFile::new(path);
        let keep = texture(Guid::generate());
        let drop_me = texture(Guid::generate());

        let changes = collection.reconcile(
            path,
            &source,
            vec![AssetInfo::named(keep.clone(), "brick"), AssetInfo::named(drop_me.clone(), "stone")],
            true,
        );
        assert_eq!(kinds(&changes), vec![AssetChangeKind::Created, AssetChangeKind::Created]);
        assert_eq!(collection.len(), 2);

        let changes = collection.reconcile(path, &source, vec![AssetInfo::named(keep.clone(), "brick")], true);
        assert_eq!(changes, vec![DatabaseChange::modified(keep.guid()), DatabaseChange::deleted(drop_me.guid())]);
        assert!(!collection.contains(&drop_me.guid()));
        collection.verify_indices().unwrap();
    }

    #[test]
    fn test_reconcile_unchanged_is_silent() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/a.tex");
        let source = SourceFile::new(path);
        let asset = texture(Guid::generate());

        collection.reconcile(path, &source, vec![AssetInfo::new(asset.clone())], true);
        let changes = collection.reconcile(path, &source, vec![AssetInfo::new(asset.clone())], false);
        assert!(changes.is_empty());

        // Same GUID, new instance: the record changed.
        let replacement = texture(asset.guid());
        let changes = collection.reconcile(path, &source, vec![AssetInfo::new(replacement)], false);
        assert_eq!(changes, vec![DatabaseChange::modified(asset.guid())]);
    }

    #[test]
    fn test_name_defaults_to_file_stem() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/music/theme.ogg");
        let source = SourceFile::new(path);
        let asset = texture(Guid::generate());
        collection.reconcile(path, &source, vec![AssetInfo::new(asset.clone())], true);

        let record = collection.get(&asset.guid()).unwrap();
        assert_eq!(record.resource_name(), "theme");
        assert!(record.name_from_source());
        assert_eq!(record.source().path(), path);
    }

    #[test]
    fn test_type_queries() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/sky.tex");
        let source = SourceFile::new(path);
        collection.reconcile(
            path,
            &source,
            vec![
                AssetInfo::named(texture(Guid::generate()), "flat"),
                AssetInfo::named(cubemap(Guid::generate()), "sky"),
            ],
            true,
        );

        assert_eq!(names_of(&collection, "Texture", false), vec!["flat", "sky"]);
        assert_eq!(names_of(&collection, "Texture", true), vec!["flat"]);
        assert_eq!(names_of(&collection, "Cubemap", false), vec!["sky"]);
        assert_eq!(names_of(&collection, ROOT_RESOURCE_TYPE, false).len(), 2);
        assert!(names_of(&collection, ROOT_RESOURCE_TYPE, true).is_empty());
        assert!(names_of(&collection, "Sound", false).is_empty());
    }

    #[test]
    fn test_name_queries() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/pack.tex");
        let source = SourceFile::new(path);
        let long_name = "environment_lighting_probe_north";
        collection.reconcile(
            path,
            &source,
            vec![
                AssetInfo::named(texture(Guid::generate()), "grass_albedo"),
                AssetInfo::named(texture(Guid::generate()), "grass_normal"),
                AssetInfo::named(texture(Guid::generate()), long_name),
            ],
            true,
        );

        let find = |name: &str, exact: bool| {
            let mut found = Vec::new();
            collection.for_each_by_name(name, exact, "Texture", false, |r| {
                found.push(r.resource_name().to_string())
            });
            found.sort();
            found
        };

        assert_eq!(find("grass", false), vec!["grass_albedo", "grass_normal"]);
        assert_eq!(find("normal", false), vec!["grass_normal"]);
        assert_eq!(find("grass", true), Vec::<String>::new());
        assert_eq!(find("grass_albedo", true), vec!["grass_albedo"]);
        assert_eq!(find("lighting_probe_north", false), vec![long_name]);
        assert_eq!(find("lighting_probe_south", false), Vec::<String>::new());
        assert_eq!(find(long_name, true), vec![long_name]);
        assert_eq!(find("", false).len(), 3);
    }

    #[test]
    fn test_type_change_is_modify_in_place() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/thing.bin");
        let source = SourceFile::new(path);
        let guid = Guid::generate();

        collection.reconcile(path, &source, vec![AssetInfo::new(texture(guid))], true);
        let sound = Asset::from_fn(guid, |_| Ok(Sound));
        let changes = collection.reconcile(path, &source, vec![AssetInfo::new(sound)], false);

        assert_eq!(changes, vec![DatabaseChange::modified(guid)]);
        assert!(names_of(&collection, "Texture", false).is_empty());
        assert_eq!(names_of(&collection, "Sound", true), vec!["thing"]);
        collection.verify_indices().unwrap();
    }

    #[test]
    fn test_rename_preserves_guids() {
        let mut collection = AssetCollection::new();
        let old = Path::new("/assets/old_name.tex");
        let new = Path::new("/assets/sub/new_name.tex");
        let source = SourceFile::new(old);
        let derived = texture(Guid::generate());
        let named = texture(Guid::generate());
        collection.reconcile(
            old,
            &source,
            vec![AssetInfo::new(derived.clone()), AssetInfo::named(named.clone(), "fixed")],
            true,
        );

        let changes = collection.rename_source(old, new);
        assert_eq!(changes, vec![DatabaseChange::modified(derived.guid())]);

        assert!(!collection.is_tracked(old));
        assert_eq!(collection.guids_from_source(new), &[derived.guid(), named.guid()]);
        assert_eq!(collection.get(&derived.guid()).unwrap().resource_name(), "new_name");
        assert_eq!(collection.get(&named.guid()).unwrap().resource_name(), "fixed");
        assert!(collection.records_from_source(old, "Texture", false).is_empty());
        assert_eq!(collection.records_from_source(new, "Texture", false).len(), 2);
        collection.verify_indices().unwrap();
    }

    #[test]
    fn test_rename_onto_itself_keeps_records() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/same.tex");
        let source = SourceFile::new(path);
        let asset = texture(Guid::generate());
        collection.reconcile(path, &source, vec![AssetInfo::new(asset.clone())], true);

        assert!(collection.rename_source(path, path).is_empty());
        assert!(collection.contains(&asset.guid()));
        assert_eq!(collection.guids_from_source(path), &[asset.guid()]);
        collection.verify_indices().unwrap();
    }

    #[test]
    fn test_remove_source_clears_everything() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/gone.tex");
        let source = SourceFile::new(path);
        let a = texture(Guid::generate());
        let b = cubemap(Guid::generate());
        collection.reconcile(path, &source, vec![AssetInfo::new(a), AssetInfo::new(b)], true);

        let removed = collection.remove_source(path);
        assert_eq!(removed.len(), 2);
        assert!(collection.is_empty());
        assert!(collection.types.is_empty());
        assert!(collection.sources.is_empty());
        collection.verify_indices().unwrap();
    }

    #[test]
    fn test_guid_takeover_between_files() {
        let mut collection = AssetCollection::new();
        let first = Path::new("/assets/a.tex");
        let second = Path::new("/assets/b.tex");
        let guid = Guid::generate();

        collection.reconcile(first, &SourceFile::new(first), vec![AssetInfo::new(texture(guid))], true);
        let changes =
            collection.reconcile(second, &SourceFile::new(second), vec![AssetInfo::new(texture(guid))], true);

        assert_eq!(changes, vec![DatabaseChange::modified(guid)]);
        assert_eq!(collection.len(), 1);
        assert!(!collection.is_tracked(first));
        assert_eq!(collection.get(&guid).unwrap().source_path(), second);
        collection.verify_indices().unwrap();
    }

    #[test]
    fn test_from_source_in_report_order() {
        let mut collection = AssetCollection::new();
        let path = Path::new("/assets/atlas.tex");
        let source = SourceFile::new(path);
        let assets: Vec<_> = (0..5).map(|_| texture(Guid::generate())).collect();
        collection.reconcile(
            path,
            &source,
            assets.iter().map(|a| AssetInfo::new(a.clone())).collect(),
            true,
        );

        let order: Vec<Guid> = collection
            .records_from_source(path, ROOT_RESOURCE_TYPE, false)
            .iter()
            .map(|r| r.guid())
            .collect();
        assert_eq!(order, assets.iter().map(|a| a.guid()).collect::<Vec<_>>());
    }

    #[test]
    fn test_sources_under() {
        let mut collection = AssetCollection::new();
        for path in ["/assets/dir/a.tex", "/assets/dir/deep/b.tex", "/assets/other.tex"] {
            let path = Path::new(path);
            collection.reconcile(path, &SourceFile::new(path), vec![AssetInfo::new(texture(Guid::generate()))], true);
        }
        let mut under = collection.sources_under(Path::new("/assets/dir"));
        under.sort();
        assert_eq!(
            under,
            vec![PathBuf::from("/assets/dir/a.tex"), PathBuf::from("/assets/dir/deep/b.tex")]
        );
    }
}
