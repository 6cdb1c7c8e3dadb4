//! # Basic Data Structures
//!
//! - `storage`: arena-based storage for machine instructions, blocks and
//!   functions.

pub mod storage;
