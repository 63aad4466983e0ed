//! Active-record models for recordkit.
//!
//! An [`Entity`] describes a struct and its table through a static field
//! table; [`Model`] wraps a value of it and provides load, save, update and
//! delete with change tracking, lifecycle listeners, audit columns, optimistic
//! versioning, history shadow tables and date partitions.

pub mod entity;
pub mod history;
pub mod holder;
pub mod listener;
pub mod meta;
pub mod model;
pub mod partition;
pub mod statement;

pub use entity::{Column, Entity, Field, Getter, Setter, assign};
pub use history::keeps_history;
pub use holder::{FieldFilter, ModelHolder};
pub use listener::{ModelEvent, ModelListener};
pub use meta::ModelMeta;
pub use model::Model;
pub use partition::{DatePartition, MetaPartition, Partition};
