//! Database module: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: typed row and view models returned by repositories.
//! - `repo`: SQL-only functions that map rows into those models.
//!
//! External modules should import from `kol_ingest::db`; the repository API
//! and commonly used models are re-exported here.

pub mod model;
pub mod repo;

pub use model::{NewVideo, PendingAudio, SeriesRef, VideoLocators};
pub use repo::*;
