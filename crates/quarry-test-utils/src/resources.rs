//! Resource types produced by the test importers.

use quarry_assets::{Resource, ResourceType};

/// Abstract parent of [`AudioClip`] and [`Font`].
pub struct Media;

impl Resource for Media {
    fn type_name() -> &'static str {
        "Media"
    }
}

/// Raw audio bytes.
#[derive(Debug)]
pub struct AudioClip {
    pub samples: Vec<u8>,
}

impl Resource for AudioClip {
    fn type_name() -> &'static str {
        "AudioClip"
    }

    fn parent_types() -> Vec<ResourceType> {
        vec![ResourceType::of::<Media>()]
    }
}

/// A font file: its first line is the family name.
#[derive(Debug)]
pub struct Font {
    pub family: String,
    pub data: Vec<u8>,
}

impl Resource for Font {
    fn type_name() -> &'static str {
        "Font"
    }

    fn parent_types() -> Vec<ResourceType> {
        vec![ResourceType::of::<Media>()]
    }
}

/// One `key=value` line of a pack file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub key: String,
    pub value: String,
}

impl Resource for PackEntry {
    fn type_name() -> &'static str {
        "PackEntry"
    }
}
