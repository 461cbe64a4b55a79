//! Abstract asset lookup.

use std::sync::{Arc, Weak};

use quarry_core::Guid;

use crate::asset::Asset;

/// Anything that can resolve a GUID to an asset.
pub trait AssetDatabase: Send + Sync {
    fn find_asset(&self, guid: &Guid) -> Option<Arc<Asset>>;
}

/// Non-owning handle to a database, for assets that resolve other assets
/// when they load.
pub type DatabaseRef = Weak<dyn AssetDatabase>;

/// Resolve `guid` through a [`DatabaseRef`], if the database is still alive.
pub fn resolve(database: &DatabaseRef, guid: &Guid) -> Option<Arc<Asset>> {
    database.upgrade()?.find_asset(guid)
}
