//! Incremental document inventory and cross-reference resolution.
//!
//! The [`inventory::Inventory`] decides which documents must be re-read,
//! tracks dependencies and the navigation inclusion graph, and persists itself
//! as a versioned snapshot. Parsed trees then go through the post-transform
//! [`transforms::Pipeline`], which resolves pending references through the
//! [`domains::DomainRegistry`] and prunes build-tag conditionals, before
//! navigation placeholders are expanded by a [`toctree::NavigationResolver`].

pub mod assets;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod domains;
pub mod error;
pub mod events;
pub mod freshness;
pub mod hasher;
pub mod info;
pub mod inventory;
pub mod parallel;
pub mod project;
pub mod reader;
pub mod references;
pub mod scratch;
pub mod snapshot;
pub mod std_domain;
pub mod tags;
pub mod toctree;
pub mod transforms;
pub mod tree;
pub mod types;

pub use error::Error;
pub use inventory::Inventory;
