//! Tag identification types
//!
//! - [`TagKey`]: the stable external identifier (namespace + name) that a
//!   protocol layer maps its node identifiers onto
//! - [`TagHandle`]: the O(1) index handed out by the store on creation
//!
//! ```rust
//! use tagsim_core::TagKey;
//!
//! let key = TagKey::new("simulation", "SineWave");
//! assert_eq!(key.to_string(), "simulation/SineWave");
//! assert_eq!(TagKey::parse("simulation/SineWave"), Some(key));
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable identifier for a tag: a namespace plus a name unique within it
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
    namespace: Arc<str>,
    name: Arc<str>,
}

impl TagKey {
    pub fn new(namespace: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses the `namespace/name` form produced by `Display`
    ///
    /// The split happens at the first `/`; both halves must be non-empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, name) = s.split_once('/')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl core::fmt::Display for TagKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Index of a tag inside its store
///
/// Handles are issued in creation order and never reused, since tags are
/// only destroyed all at once during teardown.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TagHandle(pub(crate) u32);

impl TagHandle {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for TagHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TagHandle({})", self.0)
    }
}

impl Serialize for TagHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for TagHandle {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let index = u32::deserialize(deserializer)?;
        Ok(Self(index))
    }
}
