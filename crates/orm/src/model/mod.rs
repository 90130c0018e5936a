//! Model System - table metadata and row entities
//!
//! - `core_trait`: the `Model` trait describing a table and its relations
//! - `attributes`: current/original attribute maps with dirty tracking
//! - `entity`: one row of a model
//! - `persistence`: insert, update, delete and fetch for entities

pub mod attributes;
pub mod core_trait;
pub mod entity;
pub mod persistence;

pub use attributes::Attributes;
pub use core_trait::Model;
pub use entity::Entity;
