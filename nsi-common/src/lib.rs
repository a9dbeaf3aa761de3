//! # NSI Common Library
//!
//! Client-side core for the NSI (reference data) console:
//! - Value normalizers and record extractors for loosely-typed RPC payloads
//! - Field-alias tables and directory resolvers
//! - Entity mappers and snapshot composers
//! - Aggregated search
//! - Backend client (RPC, meta RPC, REST) and login flow
//! - Configuration loading

pub mod auth;
pub mod client;
pub mod collate;
pub mod config;
pub mod dates;
pub mod directory;
pub mod entities;
pub mod error;
pub mod fields;
pub mod http;
pub mod measure;
pub mod records;
pub mod relations;
pub mod search;
pub mod store;
pub mod value;

#[cfg(test)]
mod testing;

pub use client::Backend;
pub use directory::{DirectoryLookup, DirectoryOption};
pub use error::{Error, Result};
pub use http::HttpBackend;
