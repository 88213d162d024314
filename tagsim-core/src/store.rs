//! Bounded collection of tags
//!
//! The store is populated through `&mut self` before it is shared, and torn
//! down through `&mut self` after it is unshared again. While it is shared
//! every access goes through `&self` and the per-tag locks, so the set of
//! tags itself never changes under concurrent readers.

use crate::config::TagSpec;
use crate::error::{TagError, TagResult};
use crate::tag::Tag;
use crate::tag_key::{TagHandle, TagKey};
use crate::value::TagType;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, TryReserveError};
use tracing::{debug, info};

#[derive(Debug)]
pub struct TagStore {
    tags: Vec<Tag>,
    index: HashMap<TagKey, TagHandle>,
    max_tags: usize,
}

impl TagStore {
    /// Creates an empty store holding at most `max_tags` tags
    pub fn with_capacity(max_tags: usize) -> Self {
        Self {
            tags: Vec::new(),
            index: HashMap::new(),
            max_tags,
        }
    }

    /// Creates a tag from `spec` and returns its handle
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` once `max_tags` tags exist
    /// - `DuplicateTag` if the key is already taken
    /// - `InvalidSimulation` for unusable simulation parameters
    /// - `InvalidConfiguration` for an alarm on a non-`Float` tag
    /// - `LockInitialization` if the tag cell cannot be allocated
    /// - `CopyFailed` if the initial text cannot be copied
    ///
    /// On any error the store is unchanged.
    pub fn create(&mut self, spec: &TagSpec, now: DateTime<Utc>) -> TagResult<TagHandle> {
        let key = spec.key();

        if self.tags.len() >= self.max_tags {
            return Err(TagError::CapacityExceeded {
                max_tags: self.max_tags,
                tag: key.to_string(),
            });
        }

        if self.index.contains_key(&key) {
            return Err(TagError::DuplicateTag {
                tag: key.to_string(),
            });
        }

        spec.simulation.validate(&key, spec.initial.tag_type())?;

        if spec.alarm_threshold.is_some() && spec.initial.tag_type() != TagType::Float {
            return Err(TagError::InvalidConfiguration {
                parameter: format!("{}.alarm_threshold", key),
                reason: format!(
                    "alarms are only supported on Float tags, not {}",
                    spec.initial.tag_type()
                ),
            });
        }

        let handle = TagHandle::new(u32::try_from(self.tags.len()).map_err(|_| {
            TagError::CapacityExceeded {
                max_tags: self.max_tags,
                tag: key.to_string(),
            }
        })?);

        self.tags
            .try_reserve(1)
            .map_err(|e| slot_allocation_failed(&key, e))?;
        self.index
            .try_reserve(1)
            .map_err(|e| slot_allocation_failed(&key, e))?;

        let tag = Tag::new(
            key.clone(),
            &spec.initial,
            spec.simulation,
            spec.alarm_threshold,
            now,
        )?;

        debug!(
            tag = %key,
            %handle,
            tag_type = %tag.tag_type(),
            simulation = ?spec.simulation.kind(),
            "created tag"
        );

        self.tags.push(tag);
        self.index.insert(key, handle);
        Ok(handle)
    }

    /// Resolves a handle in O(1)
    pub fn lookup(&self, handle: TagHandle) -> TagResult<&Tag> {
        self.tags
            .get(handle.index())
            .ok_or_else(|| TagError::TagNotFound {
                tag: handle.to_string(),
            })
    }

    /// Resolves an external key to its handle
    pub fn resolve(&self, key: &TagKey) -> Option<TagHandle> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &TagKey) -> Option<&Tag> {
        self.resolve(key).and_then(|h| self.tags.get(h.index()))
    }

    /// Tags in creation order
    pub fn iter(&self) -> impl Iterator<Item = (TagHandle, &Tag)> {
        self.tags
            .iter()
            .enumerate()
            .map(|(i, tag)| (TagHandle::new(i as u32), tag))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    /// Releases every tag and returns how many were destroyed
    ///
    /// Requires exclusive access, so it cannot overlap with any reader,
    /// writer or scheduler tick.
    pub fn destroy_all(&mut self) -> usize {
        let count = self.tags.len();
        self.index.clear();
        self.tags.clear();
        info!(count, "destroyed all tags");
        count
    }
}

// The tag's mutex itself is infallible; reserving its slot is the only step
// of cell setup that can fail.
fn slot_allocation_failed(key: &TagKey, error: TryReserveError) -> TagError {
    TagError::LockInitialization {
        tag: key.to_string(),
        reason: error.to_string(),
    }
}
