//! Ingestion pipelines for a Torah-lecture media catalog: sync YouTube
//! metadata into the relational catalog, migrate extracted audio into object
//! storage, and attach transcripts next to their audio objects.

pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod storage;
pub mod sync;
pub mod youtube;
