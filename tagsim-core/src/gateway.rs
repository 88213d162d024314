//! Read/write entry points for an external protocol layer
//!
//! Every call resolves a handle, copies the value across the tag's lock and
//! bumps the global counters. Successful calls count as requests; rejected
//! calls (unknown handle, type mismatch, failed copy) count as errors.
//!
//! ```rust
//! use std::sync::Arc;
//! use tagsim_core::{SimulatorConfig, SimulatorContext, TagKey, TagValue};
//!
//! let ctx = Arc::new(SimulatorContext::new(SimulatorConfig::default()).unwrap());
//! let gateway = ctx.gateway();
//!
//! let handle = gateway.resolve(&TagKey::new("basic", "Int32Variable")).unwrap();
//! gateway.write(handle, &TagValue::Int32(7)).unwrap();
//! assert_eq!(gateway.read(handle).unwrap(), TagValue::Int32(7));
//! ```

use crate::context::SimulatorContext;
use crate::error::{TagError, TagResult};
use crate::tag::{Tag, TagInfo};
use crate::tag_key::{TagHandle, TagKey};
use crate::value::TagValue;
use std::sync::Arc;
use tracing::debug;

/// Cheaply cloneable handle for concurrent reads and writes
///
/// Each gateway keeps the context alive, so tags cannot be torn down while
/// any gateway exists.
#[derive(Clone, Debug)]
pub struct AccessGateway {
    ctx: Arc<SimulatorContext>,
}

impl AccessGateway {
    pub fn new(ctx: Arc<SimulatorContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<SimulatorContext> {
        &self.ctx
    }

    pub fn resolve(&self, key: &TagKey) -> Option<TagHandle> {
        self.ctx.store().resolve(key)
    }

    /// Returns an independent copy of the tag's current value
    pub fn read(&self, handle: TagHandle) -> TagResult<TagValue> {
        self.counted(|| self.tag(handle)?.read())
    }

    /// Replaces the tag's value with a copy of `value`
    ///
    /// The payload kind must equal the tag's kind; otherwise nothing is
    /// written and `TypeMismatch` is returned.
    pub fn write(&self, handle: TagHandle, value: &TagValue) -> TagResult<()> {
        self.counted(|| {
            let tag = self.tag(handle)?;
            tag.write(value, self.ctx.now())?;
            debug!(tag = %tag.key(), %value, "value written");
            Ok(())
        })
    }

    pub fn read_key(&self, key: &TagKey) -> TagResult<TagValue> {
        let handle = self.handle_for(key)?;
        self.read(handle)
    }

    pub fn write_key(&self, key: &TagKey, value: &TagValue) -> TagResult<()> {
        let handle = self.handle_for(key)?;
        self.write(handle, value)
    }

    /// Describes a tag without counting as a request
    pub fn info(&self, handle: TagHandle) -> TagResult<TagInfo> {
        self.ctx.store().lookup(handle)?.info()
    }

    /// Registers a connected client for the lifetime of the returned guard
    pub fn connect(&self) -> ClientSession {
        self.ctx.stats().client_connected();
        ClientSession {
            ctx: Arc::clone(&self.ctx),
        }
    }

    fn tag(&self, handle: TagHandle) -> TagResult<&Tag> {
        self.ctx.store().lookup(handle)
    }

    fn handle_for(&self, key: &TagKey) -> TagResult<TagHandle> {
        self.resolve(key).ok_or_else(|| {
            self.ctx.stats().record_error();
            TagError::TagNotFound {
                tag: key.to_string(),
            }
        })
    }

    fn counted<T>(&self, op: impl FnOnce() -> TagResult<T>) -> TagResult<T> {
        let result = op();
        match &result {
            Ok(_) => self.ctx.stats().record_request(),
            Err(e) => {
                self.ctx.stats().record_error();
                debug!(error = %e, code = e.error_code(), "gateway call rejected");
            }
        }
        result
    }
}

/// Keeps the connected-client gauge raised until dropped
#[derive(Debug)]
pub struct ClientSession {
    ctx: Arc<SimulatorContext>,
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.ctx.stats().client_disconnected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulatorConfig, TagSpec};
    use crate::value::TagType;
    use std::thread;

    fn gateway() -> AccessGateway {
        let config = SimulatorConfig::default()
            .tag(TagSpec::new("plant", "Count", 0i32))
            .tag(TagSpec::new("plant", "Label", "idle"));
        Arc::new(SimulatorContext::new(config).unwrap()).gateway()
    }

    fn key(name: &str) -> TagKey {
        TagKey::new("plant", name)
    }

    #[test]
    fn test_read_write_counts_requests() {
        let gw = gateway();
        let h = gw.resolve(&key("Count")).unwrap();

        gw.write(h, &TagValue::Int32(5)).unwrap();
        assert_eq!(gw.read(h).unwrap(), TagValue::Int32(5));

        let stats = gw.context().stats();
        assert_eq!(stats.total_requests(), 2);
        assert_eq!(stats.total_errors(), 0);
    }

    #[test]
    fn test_type_mismatch_counts_error_and_leaves_value() {
        let gw = gateway();
        let h = gw.resolve(&key("Count")).unwrap();

        let err = gw.write(h, &TagValue::from("x")).unwrap_err();
        assert!(matches!(
            err,
            TagError::TypeMismatch {
                expected: TagType::Int32,
                ..
            }
        ));
        assert_eq!(gw.read(h).unwrap(), TagValue::Int32(0));

        let stats = gw.context().stats();
        assert_eq!(stats.total_errors(), 1);
        assert_eq!(stats.total_requests(), 1);
    }

    #[test]
    fn test_unknown_handle_and_key() {
        let gw = gateway();
        assert!(matches!(
            gw.read(TagHandle::new(99)),
            Err(TagError::TagNotFound { .. })
        ));
        assert!(matches!(
            gw.write_key(&key("Missing"), &TagValue::Int32(1)),
            Err(TagError::TagNotFound { .. })
        ));
        assert_eq!(gw.context().stats().total_errors(), 2);
    }

    #[test]
    fn test_key_access() {
        let gw = gateway();
        gw.write_key(&key("Label"), &TagValue::from("running"))
            .unwrap();
        assert_eq!(
            gw.read_key(&key("Label")).unwrap(),
            TagValue::from("running")
        );
    }

    #[test]
    fn test_client_session_gauge() {
        let gw = gateway();
        let a = gw.connect();
        let b = gw.connect();
        assert_eq!(gw.context().stats().connected_clients(), 2);
        drop(a);
        drop(b);
        assert_eq!(gw.context().stats().connected_clients(), 0);
    }

    #[test]
    fn test_concurrent_text_writes_never_tear() {
        let gw = gateway();
        let h = gw.resolve(&key("Label")).unwrap();
        let words = ["alpha-alpha-alpha", "bravo", "charlie-charlie"];

        let writers: Vec<_> = words
            .iter()
            .map(|word| {
                let gw = gw.clone();
                let value = TagValue::from(*word);
                thread::spawn(move || {
                    for _ in 0..500 {
                        gw.write(h, &value).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let gw = gw.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    let value = gw.read(h).unwrap();
                    let text = value.as_str().unwrap().to_string();
                    assert!(
                        text == "idle" || words.contains(&text.as_str()),
                        "torn read: {text}"
                    );
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(gw.context().stats().total_errors(), 0);
        assert_eq!(gw.context().stats().total_requests(), 3500);
    }
}
