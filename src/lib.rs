//! Coordinate Resolution & Record Reconciliation Engine
//!
//! Turns raw scraped branch records into enriched, deduplicated location
//! data: expands heterogeneous map links into validated coordinates,
//! forward-geocodes free-text addresses, and reconciles freshly scraped
//! records against a canonical dataset.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `models`: Core data models and the geographic bounding box.
//! - `patterns`: Ordered coordinate extraction rules for map URLs.
//! - `normalize`: Address cleaning and pincode extraction.
//! - `resolver`: Concurrent short-link expansion with checkpointing.
//! - `geocode`: Forward-geocoding client.
//! - `reconcile`: Pincode join, duplicate filter and similarity scoring.
//! - `storage`: Delimited-file input/output and incremental backups.
//! - `pipeline`: Batch orchestration of the three passes.

pub mod config;
pub mod errors;
pub mod geocode;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod reconcile;
pub mod resolver;
pub mod storage;
