//! Shared identity types for hearth.
//!
//! This crate is the leaf of the workspace: typed document identifiers,
//! revision tokens, node kinds, resource identifiers, and the well-known
//! constants (root and trash directory ids) every other crate agrees on.
//! It has **no internal hearth dependencies**.
//!
//! # Key Types
//!
//! |----------------------|---------------------------------------------|
//! | Type                 | Purpose                                     |
//! |----------------------|---------------------------------------------|
//! | [`DocId`]            | Which metadata document                     |
//! | [`Revision`]         | Optimistic-concurrency token of a document  |
//! | [`NodeType`]         | File or directory                           |
//! | [`ResourceIdentifier`] | External reference held by a file         |
//! |----------------------|---------------------------------------------|

pub mod constants;
pub mod ids;
pub mod resource;

pub use ids::{DocId, NodeType, Revision};
pub use resource::ResourceIdentifier;
