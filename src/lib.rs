//! VinoScan - real-time wine list scanning
//!
//! Turns camera frames of a restaurant wine list into matched wine records:
//! text recognition, fragment grouping, an admission filter, normalization
//! and tiered matching against a wine catalog, accumulated into a
//! deduplicated scan session.

pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod matching;
pub mod normalize;
pub mod session;
pub mod shared;
pub mod storage;
pub mod vision;

pub use error::{Result, ScanError};
