#![doc = "hazout-core: core logic for the NSHM hazard results catalog and hazard curves."]

//! This crate holds all domain logic; transports (S3 over HTTP, CLI, file
//! backed curve tables) live in the `hazout` crate.
//!
//! # Modules
//! - [`domain`]: closed enumerations (IMT, source type, GMM) and result data types
//! - [`classify`]: bucket key → classified record
//! - [`store`]: object lister contract, paginated bucket scanner, user enumerator
//! - [`group`]: records → hazard runs
//! - [`response`]: JSON envelopes
//! - [`index`]: the end-to-end results catalog pipeline
//! - [`curve`]: hazard curve requests and the calculator contract

pub mod classify;
pub mod curve;
pub mod domain;
pub mod error;
pub mod group;
pub mod index;
pub mod response;
pub mod store;

pub use error::{IndexError, Result, StoreError};
