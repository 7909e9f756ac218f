//! Building blocks for resource providers: a tree value for specs, path
//! lookups, change-gated field setters, ordered save operations, tag
//! reconciliation and a per-session configuration cache.

pub mod changes;
pub mod config_store;
pub mod context;
pub mod error;
pub mod path;
pub mod resource;
pub mod save_op;
pub mod setter;
pub mod tags;
pub mod value;
