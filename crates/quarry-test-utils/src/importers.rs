//! Recording importers.
//!
//! Every importer here fails on content starting with `!`, which lets tests
//! break a file on purpose.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use quarry_assets::{
    Asset, AssetImporter, AssetInfo, AssetResult, ImportContext, ImporterSerializer, ResourceLoader,
    SourceFile,
};
use quarry_core::Guid;
use serde::{Deserialize, Serialize};

use crate::log::ImportLog;
use crate::resources::{AudioClip, Font, PackEntry};

fn reject_broken(cx: &ImportContext<'_>) -> AssetResult<()> {
    if cx.bytes().starts_with(b"!") {
        return Err(cx.error("content is marked broken"));
    }
    Ok(())
}

/// Settings of single-asset importers: the GUID they chose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuidSettings {
    pub guid: Option<Guid>,
}

struct ClipLoader {
    source: Arc<SourceFile>,
    log: Arc<ImportLog>,
    delay: Duration,
}

impl ResourceLoader for ClipLoader {
    type Output = AudioClip;

    fn load(&self, _asset: &Asset) -> AssetResult<AudioClip> {
        self.log.record_load();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(AudioClip {
            samples: self.source.read()?,
        })
    }
}

/// One [`AudioClip`] per file, named after the file.
pub struct AudioImporter {
    log: Arc<ImportLog>,
    load_delay: Duration,
    guid: Option<Guid>,
    asset: Option<Arc<Asset>>,
}

impl AssetImporter for AudioImporter {
    fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
        let _active = self.log.begin(cx.path());
        self.log.record_previous_data(cx.previous_import_data());
        reject_broken(cx)?;

        let guid = *self.guid.get_or_insert_with(Guid::generate);
        let asset = match &self.asset {
            Some(asset) if asset.guid() == guid => asset.clone(),
            _ => {
                let asset = Asset::new(
                    guid,
                    ClipLoader {
                        source: cx.source().clone(),
                        log: self.log.clone(),
                        delay: self.load_delay,
                    },
                );
                self.asset = Some(asset.clone());
                asset
            }
        };
        cx.report(AssetInfo::new(asset));

        let hash = cx.content_hash().to_string();
        cx.set_import_data(hash);
        Ok(())
    }
}

/// Serializer for `.wav` and `.ogg`.
pub struct AudioSerializer {
    log: Arc<ImportLog>,
    load_delay: Duration,
}

impl AudioSerializer {
    pub fn new(log: Arc<ImportLog>) -> Self {
        Self {
            log,
            load_delay: Duration::ZERO,
        }
    }

    /// Make every clip load sleep, to widen load races.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

impl ImporterSerializer for AudioSerializer {
    type Importer = AudioImporter;
    type Settings = GuidSettings;

    fn name(&self) -> &str {
        "audio"
    }

    fn extensions(&self) -> &[&str] {
        &["wav", "ogg"]
    }

    fn create_importer(&self) -> AudioImporter {
        AudioImporter {
            log: self.log.clone(),
            load_delay: self.load_delay,
            guid: None,
            asset: None,
        }
    }

    fn settings(&self, importer: &AudioImporter) -> GuidSettings {
        GuidSettings {
            guid: importer.guid,
        }
    }

    fn apply_settings(&self, importer: &mut AudioImporter, settings: GuidSettings) {
        importer.guid = settings.guid;
    }
}

struct FontLoader {
    source: Arc<SourceFile>,
    log: Arc<ImportLog>,
}

impl ResourceLoader for FontLoader {
    type Output = Font;

    fn load(&self, _asset: &Asset) -> AssetResult<Font> {
        self.log.record_load();
        let data = self.source.read()?;
        let family = String::from_utf8_lossy(&data)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(Font { family, data })
    }
}

/// One [`Font`] per file, named by its first line.
pub struct FontImporter {
    log: Arc<ImportLog>,
    io_delay: Duration,
    guid: Option<Guid>,
    asset: Option<(String, Arc<Asset>)>,
}

impl AssetImporter for FontImporter {
    fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
        let _active = self.log.begin(cx.path());
        if !self.io_delay.is_zero() {
            std::thread::sleep(self.io_delay);
        }
        reject_broken(cx)?;

        let family = String::from_utf8_lossy(cx.bytes())
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| cx.error("missing family name"))?;

        let guid = *self.guid.get_or_insert_with(Guid::generate);
        let asset = match &self.asset {
            Some((cached, asset)) if *cached == family && asset.guid() == guid => asset.clone(),
            _ => {
                let asset = Asset::new(
                    guid,
                    FontLoader {
                        source: cx.source().clone(),
                        log: self.log.clone(),
                    },
                );
                self.asset = Some((family.clone(), asset.clone()));
                asset
            }
        };
        cx.report(AssetInfo::named(asset, family));
        Ok(())
    }
}

/// Serializer for `.font` and `.ttf`.
pub struct FontSerializer {
    log: Arc<ImportLog>,
    io_delay: Duration,
}

impl FontSerializer {
    pub fn new(log: Arc<ImportLog>) -> Self {
        Self {
            log,
            io_delay: Duration::ZERO,
        }
    }

    /// Simulate slow reads inside every import.
    pub fn with_io_delay(mut self, delay: Duration) -> Self {
        self.io_delay = delay;
        self
    }
}

impl ImporterSerializer for FontSerializer {
    type Importer = FontImporter;
    type Settings = GuidSettings;

    fn name(&self) -> &str {
        "font"
    }

    fn extensions(&self) -> &[&str] {
        &["font", "ttf"]
    }

    fn create_importer(&self) -> FontImporter {
        FontImporter {
            log: self.log.clone(),
            io_delay: self.io_delay,
            guid: None,
            asset: None,
        }
    }

    fn settings(&self, importer: &FontImporter) -> GuidSettings {
        GuidSettings {
            guid: importer.guid,
        }
    }

    fn apply_settings(&self, importer: &mut FontImporter, settings: GuidSettings) {
        importer.guid = settings.guid;
    }
}

/// Settings of [`PackImporter`]: the GUID of every key seen so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackSettings {
    pub guids: BTreeMap<String, Guid>,
}

struct PackEntryLoader {
    entry: PackEntry,
}

impl ResourceLoader for PackEntryLoader {
    type Output = PackEntry;

    fn load(&self, _asset: &Asset) -> AssetResult<PackEntry> {
        Ok(self.entry.clone())
    }
}

/// `key=value` lines, one [`PackEntry`] asset per key.
///
/// Identity follows the key, not the line position. Unchanged content is
/// recognized through the previous-import-data token and reported from
/// cache without parsing.
pub struct PackImporter {
    log: Arc<ImportLog>,
    guids: BTreeMap<String, Guid>,
    entries: Vec<(PackEntry, Arc<Asset>)>,
    parsed_hash: Option<String>,
}

impl PackImporter {
    fn parse(&mut self, text: &str) -> AssetResult<Vec<(PackEntry, Arc<Asset>)>> {
        self.log.record_parse();
        let mut entries: Vec<(PackEntry, Arc<Asset>)> = Vec::new();
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let entry = PackEntry {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            };
            if entries.iter().any(|(existing, _)| existing.key == entry.key) {
                continue;
            }
            let guid = *self
                .guids
                .entry(entry.key.clone())
                .or_insert_with(Guid::generate);
            let asset = self
                .entries
                .iter()
                .find(|(cached, asset)| *cached == entry && asset.guid() == guid)
                .map(|(_, asset)| asset.clone())
                .unwrap_or_else(|| {
                    Asset::new(
                        guid,
                        PackEntryLoader {
                            entry: entry.clone(),
                        },
                    )
                });
            entries.push((entry, asset));
        }
        Ok(entries)
    }
}

impl AssetImporter for PackImporter {
    fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
        let log = self.log.clone();
        let _active = log.begin(cx.path());
        reject_broken(cx)?;

        let hash = cx.content_hash().to_string();
        let unchanged = cx.previous_import_data() == hash && self.parsed_hash.as_deref() == Some(hash.as_str());
        if !unchanged {
            let text = String::from_utf8_lossy(cx.bytes()).into_owned();
            self.entries = self.parse(&text)?;
            self.parsed_hash = Some(hash.clone());
        }

        for (entry, asset) in &self.entries {
            cx.report(AssetInfo::named(asset.clone(), entry.key.clone()));
        }
        cx.set_import_data(hash);
        Ok(())
    }
}

/// Serializer for `.pack`.
pub struct PackSerializer {
    log: Arc<ImportLog>,
}

impl PackSerializer {
    pub fn new(log: Arc<ImportLog>) -> Self {
        Self { log }
    }
}

impl ImporterSerializer for PackSerializer {
    type Importer = PackImporter;
    type Settings = PackSettings;

    fn name(&self) -> &str {
        "pack"
    }

    fn extensions(&self) -> &[&str] {
        &["pack"]
    }

    fn create_importer(&self) -> PackImporter {
        PackImporter {
            log: self.log.clone(),
            guids: BTreeMap::new(),
            entries: Vec::new(),
            parsed_hash: None,
        }
    }

    fn settings(&self, importer: &PackImporter) -> PackSettings {
        PackSettings {
            guids: importer.guids.clone(),
        }
    }

    fn apply_settings(&self, importer: &mut PackImporter, settings: PackSettings) {
        importer.guids = settings.guids;
    }
}

/// Importer that always fails.
pub struct FailingImporter {
    log: Arc<ImportLog>,
}

impl AssetImporter for FailingImporter {
    fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
        let _active = self.log.begin(cx.path());
        Err(cx.error("this importer always fails"))
    }
}

/// Serializer whose importers always fail, for the given extensions.
pub struct FailingSerializer {
    log: Arc<ImportLog>,
    extensions: Vec<&'static str>,
}

impl FailingSerializer {
    pub fn new(log: Arc<ImportLog>, extensions: &[&'static str]) -> Self {
        Self {
            log,
            extensions: extensions.to_vec(),
        }
    }
}

impl ImporterSerializer for FailingSerializer {
    type Importer = FailingImporter;
    type Settings = ();

    fn name(&self) -> &str {
        "failing"
    }

    fn extensions(&self) -> &[&str] {
        &self.extensions
    }

    fn create_importer(&self) -> FailingImporter {
        FailingImporter {
            log: self.log.clone(),
        }
    }

    fn settings(&self, _importer: &FailingImporter) {}

    fn apply_settings(&self, _importer: &mut FailingImporter, _settings: ()) {}
}
