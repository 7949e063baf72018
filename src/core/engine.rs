//! File system engine
//!
//! Ties the block store, chain codec, directory and free list together into
//! whole-file operations. Every operation checks feasibility before it
//! mutates anything, then persists the directory and free list.

use crate::allocator::{BlockAllocator, FreeListAllocator};
use crate::block::BlockStore;
use crate::chain::ChainCodec;
use crate::config::{ContainerConfig, ContainerLayout};
use crate::directory::{DirectoryEntry, DirectoryTable};
use crate::error::{ChainFsError, Result};
use crate::io::ContainerFile;
use crate::metadata;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine shared between threads; one exclusive lock guards every mutation
pub type SharedFileSystem = Arc<RwLock<FileSystem>>;

/// Block-structured file system inside one container file
pub struct FileSystem {
    /// Container handle - interior mutability so reads can take `&self`
    store: Mutex<BlockStore>,

    codec: ChainCodec,

    directory: DirectoryTable,

    allocator: FreeListAllocator,

    config: ContainerConfig,

    layout: ContainerLayout,
}

/// Space accounting snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FileSystemStats {
    pub total_blocks: usize,
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub files: usize,
    pub fragmentation: f64,
}

/// Outcome of a defragmentation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefragReport {
    /// Files rewritten
    pub files: usize,
    /// Blocks occupied afterwards
    pub blocks: usize,
}

/// Result of a block ownership audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub files: usize,
    pub owned_blocks: usize,
    pub free_blocks: usize,
    /// Blocks neither free nor on any chain
    pub leaked: Vec<u32>,
    /// Blocks on more than one chain, or on a chain and free
    pub double_owned: Vec<u32>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.leaked.is_empty() && self.double_owned.is_empty()
    }
}

impl FileSystem {
    /// Create a new container at `path`, replacing any existing file
    pub fn create_new<P: AsRef<Path>>(path: P, config: ContainerConfig) -> Result<Self> {
        let layout = config.layout()?;
        info!(
            "Creating container at {:?}: {} blocks of {} bytes",
            path.as_ref(),
            layout.block_count,
            layout.block_size
        );

        let file = ContainerFile::create(path, layout.total_size())?;
        let mut fs = Self::assemble(file, config, layout, None);
        fs.persist()?;
        Ok(fs)
    }

    /// Open an existing container
    ///
    /// With metadata persistence enabled the directory and free list are
    /// restored from their zones; otherwise the engine starts empty and any
    /// bytes already in the data zone become unreachable.
    pub fn open<P: AsRef<Path>>(path: P, config: ContainerConfig) -> Result<Self> {
        let layout = config.layout()?;
        info!("Opening container at {:?}", path.as_ref());

        let mut file = ContainerFile::open(path, layout.total_size())?;

        let restored = if config.persist_metadata {
            let restored = metadata::load(&mut file, &layout)?;
            if restored.is_none() {
                warn!("Container has no stored metadata, starting with an empty directory");
            }
            restored
        } else {
            warn!("Metadata persistence disabled, starting with an empty directory");
            None
        };

        Ok(Self::assemble(file, config, layout, restored))
    }

    /// Open the container at `path`, creating it first if it does not exist
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: ContainerConfig) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, config)
        } else {
            Self::create_new(path, config)
        }
    }

    pub fn builder() -> FileSystemBuilder {
        FileSystemBuilder::new()
    }

    fn assemble(
        file: ContainerFile,
        config: ContainerConfig,
        layout: ContainerLayout,
        restored: Option<metadata::Metadata>,
    ) -> Self {
        let (directory, allocator) = match restored {
            Some(m) => (m.directory, m.free_list),
            None => (
                DirectoryTable::new(layout.block_count),
                FreeListAllocator::new(layout.block_count),
            ),
        };

        FileSystem {
            store: Mutex::new(BlockStore::new(file, layout)),
            codec: ChainCodec::new(&layout),
            directory,
            allocator,
            config,
            layout,
        }
    }

    /// Wrap the engine for use from several threads
    pub fn into_shared(self) -> SharedFileSystem {
        Arc::new(RwLock::new(self))
    }

    /// Write directory and free list to their zones (if enabled)
    fn persist(&mut self) -> Result<()> {
        if !self.config.persist_metadata {
            return Ok(());
        }
        let store = self.store.get_mut();
        metadata::store(
            store.file_mut(),
            &self.layout,
            &self.directory,
            &self.allocator,
        )
    }

    /// Write `chains` and the metadata for `directory`/`allocator`, then
    /// adopt them as the engine state
    ///
    /// The metadata is encoded before anything touches the container, so an
    /// oversized directory fails with no blocks written. On any error the
    /// engine keeps its previous directory and free list.
    fn commit(
        &mut self,
        directory: DirectoryTable,
        allocator: FreeListAllocator,
        chains: &[(Vec<u32>, &[u8])],
    ) -> Result<()> {
        let image = if self.config.persist_metadata {
            Some(metadata::encode(&self.layout, &directory, &allocator)?)
        } else {
            None
        };

        let store = self.store.get_mut();
        for (blocks, content) in chains {
            self.codec.write(store, blocks, content)?;
        }
        if let Some(image) = &image {
            metadata::write(store.file_mut(), &self.layout, image)?;
        }

        self.directory = directory;
        self.allocator = allocator;
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&DirectoryEntry> {
        self.directory
            .search(name)
            .ok_or_else(|| ChainFsError::NotFound(name.to_string()))
    }

    /// Create a file with content
    pub fn create(&mut self, name: &str, content: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(ChainFsError::InvalidFilename);
        }
        if self.directory.search(name).is_some() {
            return Err(ChainFsError::AlreadyExists(name.to_string()));
        }

        let mut directory = self.directory.clone();
        let mut allocator = self.allocator.clone();

        let blocks = allocator.allocate(self.codec.chunk_count(content.len()))?;
        directory.insert(name, blocks.first().copied(), content.len() as u64)?;

        let count = blocks.len();
        self.commit(directory, allocator, &[(blocks, content)])?;

        debug!("Created {} ({} bytes, {} blocks)", name, content.len(), count);
        Ok(())
    }

    /// Read a file's content
    ///
    /// Content ends at the first zero byte stored in the file.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let start = self.lookup(name)?.start_block;
        let mut store = self.store.lock();
        self.codec.read(&mut store, start)
    }

    /// Replace a file's content
    ///
    /// Space for the new chain is checked (counting the blocks the old chain
    /// will give back) before anything changes, so a failed replace leaves
    /// the file untouched. When the free list alone can hold the new chain
    /// the old blocks are not overwritten.
    pub fn replace(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let start = self.lookup(name)?.start_block;
        let old_blocks = self.codec.blocks(self.store.get_mut(), start)?;

        let needed = self.codec.chunk_count(content.len());
        let available = self.allocator.free_blocks() + old_blocks.len();
        if needed > available {
            return Err(ChainFsError::InsufficientSpace { needed, available });
        }

        let mut directory = self.directory.clone();
        let mut allocator = self.allocator.clone();

        let blocks = if needed <= allocator.free_blocks() {
            let blocks = allocator.allocate(needed)?;
            allocator.release_all(&old_blocks)?;
            blocks
        } else {
            allocator.release_all(&old_blocks)?;
            allocator.allocate(needed)?
        };
        directory.update(name, blocks.first().copied(), content.len() as u64)?;

        let count = blocks.len();
        self.commit(directory, allocator, &[(blocks, content)])?;

        debug!("Replaced {} ({} -> {} blocks)", name, old_blocks.len(), count);
        Ok(())
    }

    /// Append content to an existing file
    pub fn append(&mut self, name: &str, extra: &[u8]) -> Result<()> {
        let mut content = self.read(name)?;
        content.extend_from_slice(extra);
        self.replace(name, &content)
    }

    /// Delete a file, returning its blocks to the free list
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let start = self.lookup(name)?.start_block;
        let blocks = self.codec.blocks(self.store.get_mut(), start)?;

        let mut directory = self.directory.clone();
        let mut allocator = self.allocator.clone();
        allocator.release_all(&blocks)?;
        directory.remove(name);

        self.commit(directory, allocator, &[])?;

        debug!("Deleted {} ({} blocks released)", name, blocks.len());
        Ok(())
    }

    /// Repack every live file contiguously
    ///
    /// Files are read in directory-slot order, then the directory and free
    /// list are reset and the files rewritten in that same order, so they
    /// land on consecutive blocks starting at block 0. Nothing changes if any
    /// chain fails to decode or the repacked metadata does not fit.
    pub fn defragment(&mut self) -> Result<DefragReport> {
        info!("Starting defragmentation of {} files", self.directory.len());

        let mut files = Vec::with_capacity(self.directory.len());
        {
            let store = self.store.get_mut();
            for entry in self.directory.iter() {
                let content = self.codec.read(store, entry.start_block)?;
                files.push((entry.filename.clone(), content));
            }
        }

        let mut directory = self.directory.clone();
        let mut allocator = self.allocator.clone();
        directory.clear();
        allocator.reset();

        let mut chains = Vec::with_capacity(files.len());
        for (name, content) in &files {
            let blocks = allocator.allocate(self.codec.chunk_count(content.len()))?;
            directory.insert(name, blocks.first().copied(), content.len() as u64)?;
            chains.push((blocks, content.as_slice()));
        }

        let blocks_used = allocator.total_blocks() - allocator.free_blocks();
        self.commit(directory, allocator, &chains)?;

        info!(
            "Defragmentation complete: {} files in {} blocks",
            files.len(),
            blocks_used
        );

        Ok(DefragReport {
            files: files.len(),
            blocks: blocks_used,
        })
    }

    /// Copy a host file into the container under `name`
    pub fn import_file<P: AsRef<Path>>(&mut self, host_path: P, name: &str) -> Result<()> {
        if self.directory.search(name).is_some() {
            return Err(ChainFsError::AlreadyExists(name.to_string()));
        }
        let content = std::fs::read(host_path.as_ref())?;
        debug!("Importing {:?} as {}", host_path.as_ref(), name);
        self.create(name, &content)
    }

    /// Copy a file out of the container, returning the bytes written
    pub fn export_file<P: AsRef<Path>>(&self, name: &str, host_path: P) -> Result<usize> {
        let content = self.read(name)?;
        std::fs::write(host_path.as_ref(), &content)?;
        debug!("Exported {} to {:?}", name, host_path.as_ref());
        Ok(content.len())
    }

    /// All files, in directory-slot order
    pub fn list(&self) -> Vec<DirectoryEntry> {
        self.directory.list_occupied()
    }

    /// Check if a file exists
    pub fn exists(&self, name: &str) -> bool {
        self.directory.search(name).is_some()
    }

    /// Get a file's directory entry
    pub fn entry(&self, name: &str) -> Result<DirectoryEntry> {
        self.lookup(name).cloned()
    }

    /// Block indices of a file's chain, in link order
    pub fn chain_blocks(&self, name: &str) -> Result<Vec<u32>> {
        let start = self.lookup(name)?.start_block;
        let mut store = self.store.lock();
        self.codec.blocks(&mut store, start)
    }

    /// Get file system statistics
    pub fn stats(&self) -> FileSystemStats {
        let total_blocks = self.allocator.total_blocks();
        let free_blocks = self.allocator.free_blocks();
        FileSystemStats {
            total_blocks,
            free_blocks,
            used_blocks: total_blocks - free_blocks,
            files: self.directory.len(),
            fragmentation: self.allocator.fragmentation_score(),
        }
    }

    /// Audit block ownership
    ///
    /// Every block must be either free or on exactly one live chain.
    pub fn verify(&self) -> Result<VerifyReport> {
        let total = self.layout.block_count;
        let mut owned = vec![false; total as usize];
        let mut report = VerifyReport {
            files: self.directory.len(),
            free_blocks: self.allocator.free_blocks(),
            ..Default::default()
        };

        let mut store = self.store.lock();
        for entry in self.directory.iter() {
            for index in self.codec.blocks(&mut store, entry.start_block)? {
                if owned[index as usize] || self.allocator.is_free(index) {
                    report.double_owned.push(index);
                }
                owned[index as usize] = true;
            }
        }

        for index in 0..total {
            if owned[index as usize] {
                report.owned_blocks += 1;
            } else if !self.allocator.is_free(index) {
                report.leaked.push(index);
            }
        }

        if !report.is_consistent() {
            warn!(
                "Block audit failed: {} leaked, {} double-owned",
                report.leaked.len(),
                report.double_owned.len()
            );
        }

        Ok(report)
    }

    /// Write metadata and sync the container to disk
    pub fn flush(&mut self) -> Result<()> {
        self.persist()?;
        self.store.get_mut().sync()
    }

    /// Close the container, flushing all changes
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    pub fn path(&self) -> PathBuf {
        self.store.lock().file().path().to_path_buf()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }

    /// Payload bytes carried per block
    pub fn block_capacity(&self) -> usize {
        self.codec.capacity()
    }
}

/// Builder for opening or creating a container
///
/// # Examples
///
/// ```rust,no_run
/// use chainfs::FileSystemBuilder;
///
/// # fn main() -> chainfs::Result<()> {
/// let mut fs = FileSystemBuilder::new()
///     .path("disk.bin")
///     .block_size(512)
///     .data_zone_size(512 * 1024)
///     .build()?;
///
/// fs.create("hello.txt", b"Hello, World!")?;
/// # Ok(())
/// # }
/// ```
pub struct FileSystemBuilder {
    path: Option<PathBuf>,
    config: ContainerConfig,
    truncate: bool,
}

impl FileSystemBuilder {
    pub fn new() -> Self {
        FileSystemBuilder {
            path: None,
            config: ContainerConfig::default(),
            truncate: false,
        }
    }

    /// Container file path (required)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn data_zone_size(mut self, size: u64) -> Self {
        self.config.data_zone_size = size;
        self
    }

    pub fn persist_metadata(mut self, enabled: bool) -> Self {
        self.config.persist_metadata = enabled;
        self
    }

    /// Always start from a fresh container, discarding any existing file
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn build(self) -> Result<FileSystem> {
        let path = self
            .path
            .ok_or_else(|| ChainFsError::InvalidConfig("container path is required".to_string()))?;

        if self.truncate {
            FileSystem::create_new(path, self.config)
        } else {
            FileSystem::open_or_create(path, self.config)
        }
    }
}

impl Default for FileSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
