// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// block format, codec, chain storage and validation.

pub mod core;
pub use core::*;
