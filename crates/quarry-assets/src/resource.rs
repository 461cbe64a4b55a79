//! Resource payload types and their ancestry.

use std::any::{Any, TypeId};
use std::collections::BTreeSet;
use std::fmt;

/// Name of the type every resource descends from.
pub const ROOT_RESOURCE_TYPE: &str = "Resource";

/// Trait for loadable resource payloads.
///
/// # Example
///
/// ```ignore
/// struct AudioClip { samples: Vec<f32> }
///
/// impl Resource for AudioClip {
///     fn type_name() -> &'static str {
///         "AudioClip"
///     }
/// }
///
/// struct MusicTrack { clip: AudioClip }
///
/// impl Resource for MusicTrack {
///     fn type_name() -> &'static str {
///         "MusicTrack"
///     }
///
///     fn parent_types() -> Vec<ResourceType> {
///         vec![ResourceType::of::<AudioClip>()]
///     }
/// }
/// ```
pub trait Resource: Any + Send + Sync {
    /// Stable name used by the type indices.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Direct parents in the resource type hierarchy.
    ///
    /// The root [`AnyResource`] is implied and need not be listed.
    fn parent_types() -> Vec<ResourceType>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Marker for the root of the resource hierarchy.
///
/// Querying `ResourceType::of::<AnyResource>()` with `exact = false` matches
/// every record.
pub struct AnyResource;

impl Resource for AnyResource {
    fn type_name() -> &'static str {
        ROOT_RESOURCE_TYPE
    }
}

/// Runtime description of a [`Resource`] type.
#[derive(Clone, Copy)]
pub struct ResourceType {
    name: &'static str,
    type_id: TypeId,
    parents: fn() -> Vec<ResourceType>,
}

impl ResourceType {
    pub fn of<T: Resource>() -> Self {
        Self {
            name: T::type_name(),
            type_id: TypeId::of::<T>(),
            parents: T::parent_types,
        }
    }

    /// The root type.
    pub fn root() -> Self {
        Self::of::<AnyResource>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn parents(&self) -> Vec<ResourceType> {
        (self.parents)()
    }

    pub fn is_root(&self) -> bool {
        self.type_id == TypeId::of::<AnyResource>()
    }

    /// Names of this type and all of its ancestors, root included.
    ///
    /// Records keep these strings rather than live type handles, so the
    /// indices stay valid when the type set is reloaded.
    pub fn ancestry(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut pending = vec![*self];
        while let Some(ty) = pending.pop() {
            if names.insert(ty.name.to_string()) {
                pending.extend(ty.parents());
            }
        }
        names.insert(ROOT_RESOURCE_TYPE.to_string());
        names
    }

    /// Whether `self` is `other` or one of its descendants.
    pub fn is_a(&self, other: &ResourceType) -> bool {
        other.is_root() || self.ancestry().contains(other.name)
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ResourceType {}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceType").field(&self.name).finish()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
