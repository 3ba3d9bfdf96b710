//! Storage engine internals
//!
//! - [`error`] - Error types for store operations
//! - [`layout`] - Sample area address map and constants
//! - [`device`] - Memory device trait, sequential cursor, in-memory device
//! - [`image`] - Memory-mapped image file device
//! - [`block_table`] - Per-block chain links and tree bits
//! - [`allocator`] - 4-ary bitmap tree allocator
//! - [`chain`] - Block chain construction and teardown
//! - [`index`] - Sample slot directory
//! - [`sample`] - Sample types and streaming handle
//! - [`store`] - Public store API
//! - [`transfer`] - Declared-length ingest sessions
//! - [`playback`] - Looping / one-shot reader
//! - [`config`] - TOML configuration

pub mod allocator;
pub mod block_table;
pub mod chain;
pub mod config;
pub mod device;
pub mod error;
pub mod image;
pub mod index;
pub mod layout;
pub mod playback;
pub mod sample;
pub mod store;
pub mod transfer;
