//! auction-lbin Library
//!
//! Lowest-BIN price index for SkyBlock auction house listings

pub mod auction;
pub mod config;
pub mod item;
pub mod nbt;
pub mod persistence;
pub mod pricing;
pub mod types;
