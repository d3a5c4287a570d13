//! Database models for the path network.
//!
//! - [`path`], [`topology`]: the network and objects positioned along it
//! - [`trail`], [`intervention`]: topology-based records
//! - [`reference`]: structure-scoped reference lists
//! - [`structure`], [`user`]: ownership and authentication
//! - [`tourism_datasource`]: remote tourism feeds

pub mod intervention;
pub mod path;
pub mod reference;
pub mod structure;
pub mod topology;
pub mod tourism_datasource;
pub mod trail;
pub mod user;
