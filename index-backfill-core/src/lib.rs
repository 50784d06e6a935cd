#![doc = "index-backfill-core: core logic library for index-backfill."]

//! This crate contains the reconciliation pipeline: loading a local export,
//! probing a remote document index for the records it already holds, diffing,
//! and uploading the missing records with error-class-specific recovery.
//! Transport to a concrete index lives in the CLI crate, behind
//! [`contract::RemoteStore`].
//!
//! # Usage
//! Build a validated [`config::SyncConfig`], implement (or mock)
//! [`contract::RemoteStore`] and call [`synchronise::run`].

pub mod audit;
pub mod cancel;
pub mod config;
pub mod contract;
pub mod dataset;
pub mod diff;
pub mod probe;
pub mod synchronise;
pub mod uploader;
