//! Concurrent file-system backed asset database.
//!
//! A [`FileSystemDatabase`] scans a directory tree, hands every file with a
//! registered extension to a per-file [`AssetImporter`], and indexes the
//! [`Asset`]s the importers report by GUID, resource type, name and source
//! file. It keeps that index live as files are created, edited, renamed and
//! deleted, and fires a [`DatabaseChange`] for every record it touches.
//!
//! # Overview
//!
//! - [`Asset`] - stable identity plus a lazy, single-flight resource factory
//! - [`Resource`] / [`ResourceType`] - loaded payload types and their ancestry
//! - [`ImporterSerializer`] / [`SerializerRegistry`] - importer factories keyed by extension
//! - [`FileSystemDatabase`] - the scanner, import pool and query surface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quarry_assets::prelude::*;
//!
//! let registry = Arc::new(SerializerRegistry::new());
//! registry.register(AudioClipSerializer);
//!
//! let database = FileSystemDatabase::new(DatabaseConfig::new("assets"), registry)?;
//! let (_, changes) = database.subscribe_channel();
//!
//! for asset in database.assets_of_type::<AudioClip>(false) {
//!     let clip = asset.load::<AudioClip>()?;
//!     println!("{} samples", clip.samples.len());
//! }
//! ```

pub mod asset;
pub mod backends;
mod cache;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod event;
mod fs_database;
pub mod importer;
pub mod metadata;
mod path_lock;
mod queue;
pub mod registry;
pub mod resource;
mod scan;
pub mod watch;
mod workers;

pub use asset::{Asset, ErasedResourceLoader, FnLoader, Loaded, ResourceLoader};
pub use backends::Backends;
pub use collection::{AssetCollection, AssetRecord, NAME_KEY_LEN};
pub use config::{DatabaseConfig, ProgressCallback};
pub use database::{AssetDatabase, DatabaseRef};
pub use error::{AssetError, AssetResult};
pub use event::{AssetChangeKind, DatabaseChange, SubscriptionId};
pub use fs_database::FileSystemDatabase;
pub use importer::{AssetImporter, AssetInfo, ImportContext, SourceFile};
pub use metadata::{DEFAULT_METADATA_EXTENSION, ImporterMetadata};
pub use registry::{Candidate, ErasedSerializer, ImporterSerializer, SerializerRegistry};
pub use resource::{AnyResource, Resource, ResourceType};
pub use watch::{FileChange, FileChangeKind};

pub use quarry_core::Guid;

/// Everything needed to write importers and query a database.
pub mod prelude {
    pub use crate::{
        Asset, AssetChangeKind, AssetDatabase, AssetError, AssetImporter, AssetInfo, AssetRecord,
        AssetResult, DatabaseChange, DatabaseConfig, FileChange, FileChangeKind,
        FileSystemDatabase, Guid, ImportContext, ImporterSerializer, Loaded, Resource,
        ResourceLoader, ResourceType, SerializerRegistry,
    };
}
