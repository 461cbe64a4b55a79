//! Globally unique identifiers for assets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 128-bit globally unique identifier.
///
/// GUIDs are the stable key of an asset. They never change when the source
/// file moves, so anything holding a GUID keeps pointing at the same asset
/// across renames.
///
/// # Example
///
/// ```ignore
/// let guid = Guid::generate();
/// let parsed: Guid = guid.to_string().parse()?;
/// assert_eq!(guid, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// The all-zero identifier. Never produced by [`Guid::generate`].
    pub const NIL: Guid = Guid(Uuid::nil());

    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Build a GUID from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::NIL
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HashSet;

    #[test]
    fn test_generate_is_unique() {
        let guids: HashSet<Guid> = (0..1000).map(|_| Guid::generate()).collect();
        assert_eq!(guids.len(), 1000);
        assert!(!guids.contains(&Guid::NIL));
    }

    #[test]
    fn test_parse_display() {
        let guid = Guid::generate();
        let text = guid.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.parse::<Guid>().unwrap(), guid);
        assert_eq!(format!("  {text} ").parse::<Guid>().unwrap(), guid);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("not-a-guid".parse::<Guid>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let guid = Guid::from_bytes([7; 16]);
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, format!("\"{guid}\""));
        let back: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, guid);
    }

    #[test]
    fn test_default_is_nil() {
        assert!(Guid::default().is_nil());
    }
}
