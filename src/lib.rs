//! Moves JSON documents between seed files and a document store.
//!
//! [`import::Importer`] loads many files concurrently into collections named after them,
//! applying an [`import::ExistingEntryBehavior`] to documents already present.
//! [`export::Exporter`] streams a filtered collection out as newline-separated JSON.

pub mod cli;
pub mod config;
pub mod connection;
pub mod errors;
pub mod export;
pub mod import;
pub mod logger;
pub mod outcome;
pub mod progress;
pub mod store;

pub use connection::ConnectionSettings;
pub use errors::{SeedError, StoreError};
pub use outcome::Outcome;
