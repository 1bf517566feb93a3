#![doc = "hashnode-sync-core: reconciliation engine for markdown posts and a blogging platform."]

//! This crate holds everything that does not touch the network or the process
//! environment: frontmatter parsing, asset URL rewriting, change
//! classification, the remote post index, and the reconciliation pipeline.
//! The platform itself is reached through the [`contract::PostApi`] trait.
//!
//! # Usage
//! Build a [`changes::ChangeSet`] with [`changes::classify`], then call
//! [`synchronise::synchronise`] with a `PostApi` implementation and a
//! [`config::SyncConfig`].

pub mod assets;
pub mod changes;
pub mod config;
pub mod contract;
pub mod error;
pub mod frontmatter;
pub mod index;
pub mod report;
pub mod retry;
pub mod synchronise;
