//! Error handling for tagsim core operations
//!
//! Every fallible operation in the tag store, the simulation engine and the
//! access gateway returns [`TagResult<T>`]. Nothing in this crate escalates a
//! failure to the process: each error is handed back to the immediate caller
//! as an explicit value, and the tag that was being touched keeps its previous
//! contents.
//!
//! # Error Categories
//!
//! - **Capacity** (0x2000-0x2FFF): store is full
//! - **Type** (0x3000-0x3FFF): payload kind does not match the tag's fixed kind
//! - **Configuration** (0x4000-0x4FFF): duplicate keys, invalid simulation parameters, bad config
//! - **Resource** (0x5000-0x5FFF): allocation of a tag cell or a text copy failed
//! - **Lifecycle** (0x7000-0x7FFF): periodic drivers could not start or stop, teardown blocked
//! - **I/O** (0x8000-0x8FFF): reading configuration files
//! - **JSON** (0x9000-0x9FFF): parsing configuration documents
//!
//! ## Error Chaining Example
//!
//! ```rust
//! use tagsim_core::TagError;
//!
//! let error = TagError::InvalidConfiguration {
//!     parameter: "update_interval_ms".to_string(),
//!     reason: "must be greater than zero".to_string(),
//! }
//! .with_context("Loading simulator.json");
//!
//! assert!(error.to_string().contains("Loading simulator.json"));
//! ```
//!
//! ## Error Code Usage
//!
//! ```rust
//! use tagsim_core::{TagError, TagType};
//!
//! let error = TagError::TypeMismatch {
//!     tag: "basic/FloatVariable".to_string(),
//!     expected: TagType::Float,
//!     actual: TagType::Int32,
//! };
//! assert_eq!(error.error_category(), 0x3000);
//! ```

use crate::value::TagType;
use std::io;
use thiserror::Error;

/// Unified error type for all tagsim operations
#[derive(Debug, Error)]
pub enum TagError {
    /// Tag creation attempted after the configured maximum was reached
    #[error("Tag capacity exceeded: cannot create {tag} (limit {max_tags})")]
    CapacityExceeded { max_tags: usize, tag: String },

    /// A write carried a payload whose kind differs from the tag's fixed kind
    #[error("Type mismatch on {tag}: expected {expected}, got {actual}")]
    TypeMismatch {
        tag: String,
        expected: TagType,
        actual: TagType,
    },

    /// The synchronized cell for a new tag could not be allocated
    ///
    /// `Mutex::new` cannot fail, so this is only ever produced when reserving
    /// the store's slot for the new tag (`try_reserve` on its `Vec` or
    /// `HashMap`) reports an allocation failure. Creation of that tag is
    /// aborted and nothing is left behind in the store; other tags remain
    /// usable.
    #[error("Lock initialization failed for {tag}: {reason}")]
    LockInitialization { tag: String, reason: String },

    /// Duplicating a text payload failed; the tag keeps its previous value
    #[error("Copy of {length} bytes failed for {tag}: {reason}")]
    CopyFailed {
        tag: String,
        length: usize,
        reason: String,
    },

    /// A tag with the same namespace and name already exists
    #[error("Tag already exists: {tag}")]
    DuplicateTag { tag: String },

    /// A handle or key did not resolve to a tag in this store
    #[error("Tag not found: {tag}")]
    TagNotFound { tag: String },

    /// Simulation parameters are unusable (e.g. `min > max`, zero period)
    #[error("Invalid simulation for {tag}: {reason}")]
    InvalidSimulation { tag: String, reason: String },

    /// Configuration value out of range or inconsistent
    #[error("Invalid configuration parameter {parameter}: {reason}")]
    InvalidConfiguration { parameter: String, reason: String },

    /// A periodic driver thread could not be started
    #[error("Failed to start {message}")]
    StartFailed { message: String },

    /// A periodic driver thread did not stop cleanly
    #[error("Failed to stop {message}")]
    StopFailed { message: String },

    /// The store is still shared and cannot be torn down yet
    #[error("Teardown blocked: {holders} other reference(s) to the simulator context are alive")]
    TeardownBlocked { holders: usize },

    /// No event was available before the deadline (or immediately, for `try_*`)
    #[error("No event available")]
    NoEvent,

    /// The producing side of a channel is gone
    #[error("Runtime has shut down")]
    RuntimeShutdown,

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// I/O operation errors with additional context
    #[error("I/O error: {context}: {source}")]
    IoWithContext {
        context: String,
        #[source]
        source: io::Error,
    },

    /// JSON parse errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// JSON parse errors with additional context
    #[error("JSON error: {context}: {source}")]
    JsonWithContext {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TagError {
    /// Returns true for errors that count against the global error counter
    /// when raised by the access gateway
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            TagError::TypeMismatch { .. } | TagError::CopyFailed { .. }
        )
    }

    /// Returns true if this is a capacity-related error
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, TagError::CapacityExceeded { .. })
    }

    /// Returns a numeric error code
    ///
    /// Codes are grouped by category:
    ///
    /// - **Capacity**: 0x2000-0x2FFF
    /// - **Type**: 0x3000-0x3FFF
    /// - **Configuration**: 0x4000-0x4FFF
    /// - **Resource**: 0x5000-0x5FFF
    /// - **Lifecycle**: 0x7000-0x7FFF
    /// - **I/O**: 0x8000-0x8FFF
    /// - **JSON**: 0x9000-0x9FFF
    pub const fn error_code(&self) -> u32 {
        match self {
            TagError::CapacityExceeded { .. } => 0x2001,

            TagError::TypeMismatch { .. } => 0x3001,

            TagError::DuplicateTag { .. } => 0x4001,
            TagError::TagNotFound { .. } => 0x4002,
            TagError::InvalidSimulation { .. } => 0x4003,
            TagError::InvalidConfiguration { .. } => 0x4004,

            TagError::LockInitialization { .. } => 0x5001,
            TagError::CopyFailed { .. } => 0x5002,

            TagError::StartFailed { .. } => 0x7001,
            TagError::StopFailed { .. } => 0x7002,
            TagError::TeardownBlocked { .. } => 0x7003,
            TagError::NoEvent => 0x7004,
            TagError::RuntimeShutdown => 0x7005,

            TagError::Io { .. } => 0x8001,
            TagError::IoWithContext { .. } => 0x8002,

            TagError::Json { .. } => 0x9001,
            TagError::JsonWithContext { .. } => 0x9002,
        }
    }

    /// Returns the error category (upper nibble of the code)
    pub const fn error_category(&self) -> u32 {
        self.error_code() & 0xF000
    }

    fn prepend_context<S: Into<String>>(existing: &mut String, new_context: S) {
        let new_context = new_context.into();
        existing.insert_str(0, ": ");
        existing.insert_str(0, &new_context);
    }

    /// Adds additional context to an error
    ///
    /// Variants carrying a free-form reason get the context prepended to it.
    /// `Io` and `Json` are promoted to their `*WithContext` forms. Variants
    /// that only carry identifiers are returned unchanged.
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        match self {
            TagError::LockInitialization { tag, mut reason } => {
                Self::prepend_context(&mut reason, context);
                TagError::LockInitialization { tag, reason }
            }
            TagError::CopyFailed {
                tag,
                length,
                mut reason,
            } => {
                Self::prepend_context(&mut reason, context);
                TagError::CopyFailed {
                    tag,
                    length,
                    reason,
                }
            }
            TagError::InvalidSimulation { tag, mut reason } => {
                Self::prepend_context(&mut reason, context);
                TagError::InvalidSimulation { tag, reason }
            }
            TagError::InvalidConfiguration {
                parameter,
                mut reason,
            } => {
                Self::prepend_context(&mut reason, context);
                TagError::InvalidConfiguration { parameter, reason }
            }
            TagError::StartFailed { mut message } => {
                Self::prepend_context(&mut message, context);
                TagError::StartFailed { message }
            }
            TagError::StopFailed { mut message } => {
                Self::prepend_context(&mut message, context);
                TagError::StopFailed { message }
            }

            TagError::Io { source } => TagError::IoWithContext {
                context: context.into(),
                source,
            },
            TagError::Json { source } => TagError::JsonWithContext {
                context: context.into(),
                source,
            },
            TagError::IoWithContext {
                context: mut ctx,
                source,
            } => {
                Self::prepend_context(&mut ctx, context);
                TagError::IoWithContext {
                    context: ctx,
                    source,
                }
            }
            TagError::JsonWithContext {
                context: mut ctx,
                source,
            } => {
                Self::prepend_context(&mut ctx, context);
                TagError::JsonWithContext {
                    context: ctx,
                    source,
                }
            }

            other => other,
        }
    }

    /// Converts this error into an `anyhow::Error` for application boundaries
    pub fn into_anyhow(self) -> anyhow::Error {
        self.into()
    }
}

/// Type alias for Results using TagError
pub type TagResult<T> = Result<T, TagError>;
