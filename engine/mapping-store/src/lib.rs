//! Mapping Store - Persistent player ID mappings between data providers
//!
//! Two layers keyed by player key:
//!
//! - **Curated**: manually verified, read-only to automation, always wins
//! - **Cache**: written by automated refreshes, never downgraded
//!
//! Match results from `player-linkage` are merged into the cache layer in
//! incremental or full mode, producing a [`MergeReport`].

pub mod config;
pub mod error;
pub mod persistence;
pub mod report;
pub mod store;
pub mod types;


pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use persistence::{
    CacheDocument, CacheMetadata, CacheRecord, CuratedDocument, CuratedRecord, InMemoryBackend,
    JsonFileBackend, StoreBackend,
};
pub use report::{Conflict, MergeReport, Remap};
pub use store::MappingStore;
pub use types::{MappingEntry, MergeMode, Origin};
