//! Storage engine
//!
//! - [`config`] - Container geometry and TOML configuration
//! - [`io`] - Container file handle
//! - [`block`] - Fixed-size block slots with next pointers
//! - [`chain`] - Splitting content into linked block chains
//! - [`allocator`] - Free block tracking
//! - [`directory`] - Open-addressing filename table
//! - [`header`], [`metadata`] - Persistence of directory and free list
//! - [`engine`] - Whole-file operations and defragmentation

pub mod allocator;
pub mod block;
pub mod chain;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod header;
pub mod io;
pub mod metadata;

pub use engine::{FileSystem, FileSystemBuilder};
