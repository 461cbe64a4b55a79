//! Watch a directory and print asset changes.
//!
//! Imports every `.txt` file under the given directory (default `assets/`)
//! as a text document, then prints created, modified and deleted assets as
//! files change on disk.
//!
//! ```text
//! cargo run -p quarry-assets --example watch_directory -- path/to/assets
//! ```
//!
//! Edit, rename or delete `.txt` files while it runs. Renamed files keep
//! their GUID because it is stored in the `.jado` sidecar next to them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quarry_assets::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
struct TextDocument {
    text: String,
}

impl Resource for TextDocument {
    fn type_name() -> &'static str {
        "TextDocument"
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TextSettings {
    guid: Option<Guid>,
}

#[derive(Default)]
struct TextImporter {
    guid: Option<Guid>,
    asset: Option<Arc<Asset>>,
}

impl AssetImporter for TextImporter {
    fn import(&mut self, cx: &mut ImportContext<'_>) -> AssetResult<()> {
        let guid = *self.guid.get_or_insert_with(Guid::generate);
        let asset = match &self.asset {
            Some(asset) if asset.guid() == guid => asset.clone(),
            _ => {
                let source = cx.source().clone();
                let asset = Asset::from_fn(guid, move |_| {
                    let bytes = source.read()?;
                    Ok(TextDocument {
                        text: String::from_utf8_lossy(&bytes).into_owned(),
                    })
                });
                self.asset = Some(asset.clone());
                asset
            }
        };
        cx.report(AssetInfo::new(asset));
        Ok(())
    }
}

struct TextSerializer;

impl ImporterSerializer for TextSerializer {
    type Importer = TextImporter;
    type Settings = TextSettings;

    fn name(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &[&str] {
        &["txt"]
    }

    fn create_importer(&self) -> TextImporter {
        TextImporter::default()
    }

    fn settings(&self, importer: &TextImporter) -> TextSettings {
        TextSettings {
            guid: importer.guid,
        }
    }

    fn apply_settings(&self, importer: &mut TextImporter, settings: TextSettings) {
        importer.guid = settings.guid;
    }
}

fn main() -> AssetResult<()> {
    quarry_core::logging::init();

    let root = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets"));
    std::fs::create_dir_all(&root).map_err(|e| AssetError::io(&root, e))?;

    let registry = Arc::new(SerializerRegistry::new());
    registry.register(TextSerializer);

    let config = DatabaseConfig::new(&root)
        .with_watch_debounce(Duration::from_millis(200))
        .on_import_progress(|done, total| println!("Imported {}/{} files", done, total));
    let database = FileSystemDatabase::new(config, registry)?;
    println!(
        "Watching '{}' ({} assets). Press Ctrl+C to stop.",
        database.root().display(),
        database.asset_count()
    );

    let (_subscription, events) = database.subscribe_channel();
    for change in events {
        let Some(record) = database.try_get_asset_info(&change.guid) else {
            println!("{:?} {}", change.kind, change.guid);
            continue;
        };
        let asset = record.asset().clone();
        let preview = match asset.load::<TextDocument>() {
            Ok(doc) => doc.text.lines().next().unwrap_or_default().to_string(),
            Err(e) => format!("<{}>", e),
        };
        println!(
            "{:?} {} '{}' from {}: {}",
            change.kind,
            change.guid,
            record.resource_name(),
            record.source_path().display(),
            preview
        );
    }
    Ok(())
}
