//! Persistence of the directory and free list into their reserved zones
//!
//! Each zone holds a [`ZoneHeader`] followed by a JSON payload. Both payloads
//! are serialized and size-checked by [`encode`] before either zone is
//! written, so an oversized directory never leaves the two zones out of step.

use crate::allocator::free_list::FreeListSnapshot;
use crate::allocator::FreeListAllocator;
use crate::config::ContainerLayout;
use crate::directory::{DirectorySnapshot, DirectoryTable};
use crate::error::{ChainFsError, Result};
use crate::header::{ZoneHeader, ZoneKind};
use crate::io::ContainerFile;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// In-memory metadata restored from a container
pub struct Metadata {
    pub directory: DirectoryTable,
    pub free_list: FreeListAllocator,
}

/// Header-prefixed zone images, ready to write
#[derive(Debug, Clone)]
pub struct MetadataImage {
    pub directory: Vec<u8>,
    pub free_list: Vec<u8>,
}

fn zone_bounds(layout: &ContainerLayout, kind: ZoneKind) -> (u64, u64) {
    match kind {
        ZoneKind::Directory => (layout.directory_offset, layout.directory_size),
        ZoneKind::FreeList => (layout.free_list_offset, layout.free_list_size),
    }
}

/// Serialize `value` into a header-prefixed zone image, checking it fits
fn encode_zone<T: Serialize>(
    layout: &ContainerLayout,
    kind: ZoneKind,
    value: &T,
) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(value)?;
    let header = ZoneHeader::new(kind, layout.block_size, layout.block_count, &payload);

    let (_, capacity) = zone_bounds(layout, kind);
    let needed = (ZoneHeader::SIZE + payload.len()) as u64;
    if needed > capacity {
        return Err(ChainFsError::MetadataOverflow {
            zone: kind.name(),
            needed,
            capacity,
        });
    }

    let mut image = Vec::with_capacity(needed as usize);
    image.extend_from_slice(&header.to_bytes());
    image.extend_from_slice(&payload);
    Ok(image)
}

/// Read one zone; `None` if it was never written
fn read_zone<T: DeserializeOwned>(
    file: &mut ContainerFile,
    layout: &ContainerLayout,
    kind: ZoneKind,
) -> Result<Option<T>> {
    let (offset, capacity) = zone_bounds(layout, kind);
    if capacity < ZoneHeader::SIZE as u64 {
        return Ok(None);
    }

    let mut header_bytes = [0u8; ZoneHeader::SIZE];
    file.read_at(offset, &mut header_bytes)?;

    if ZoneHeader::is_blank(&header_bytes) {
        return Ok(None);
    }

    let header = ZoneHeader::from_bytes(&header_bytes)?;
    header.validate(kind, layout.block_size, layout.block_count)?;

    if header.payload_len > capacity - ZoneHeader::SIZE as u64 {
        return Err(ChainFsError::ChecksumMismatch { zone: kind.name() });
    }

    let mut payload = vec![0u8; header.payload_len as usize];
    file.read_at(offset + ZoneHeader::SIZE as u64, &mut payload)?;
    header.verify_payload(kind, &payload)?;

    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Serialize both zones without touching the container
///
/// Fails with `MetadataOverflow` if either image exceeds its zone.
pub fn encode(
    layout: &ContainerLayout,
    directory: &DirectoryTable,
    free_list: &FreeListAllocator,
) -> Result<MetadataImage> {
    Ok(MetadataImage {
        directory: encode_zone(layout, ZoneKind::Directory, directory)?,
        free_list: encode_zone(layout, ZoneKind::FreeList, free_list)?,
    })
}

/// Write previously encoded zones
pub fn write(file: &mut ContainerFile, layout: &ContainerLayout, image: &MetadataImage) -> Result<()> {
    file.write_at(layout.directory_offset, &image.directory)?;
    file.write_at(layout.free_list_offset, &image.free_list)?;

    tracing::trace!(
        "Stored metadata: directory {} bytes, free list {} bytes",
        image.directory.len(),
        image.free_list.len()
    );

    Ok(())
}

/// Write both metadata zones
pub fn store(
    file: &mut ContainerFile,
    layout: &ContainerLayout,
    directory: &DirectoryTable,
    free_list: &FreeListAllocator,
) -> Result<()> {
    let image = encode(layout, directory, free_list)?;
    write(file, layout, &image)
}

/// Load both metadata zones
///
/// Returns `None` for a container whose zones were never written. Stored
/// table sizes are checked against the layout before any table is built.
pub fn load(file: &mut ContainerFile, layout: &ContainerLayout) -> Result<Option<Metadata>> {
    let directory: Option<DirectorySnapshot> = read_zone(file, layout, ZoneKind::Directory)?;
    let free_list: Option<FreeListSnapshot> = read_zone(file, layout, ZoneKind::FreeList)?;

    let (directory, free_list) = match (directory, free_list) {
        (None, None) => return Ok(None),
        (Some(directory), Some(free_list)) => (directory, free_list),
        (None, Some(_)) => return Err(ChainFsError::InvalidMagic(ZoneKind::Directory.name())),
        (Some(_), None) => return Err(ChainFsError::InvalidMagic(ZoneKind::FreeList.name())),
    };

    for stored in [directory.capacity, free_list.total_blocks] {
        if stored != layout.block_count {
            return Err(ChainFsError::LayoutMismatch {
                stored_block_size: layout.block_size,
                stored_block_count: stored,
                block_size: layout.block_size,
                block_count: layout.block_count,
            });
        }
    }

    let directory = DirectoryTable::try_from(directory).map_err(|reason| {
        ChainFsError::CorruptMetadata {
            zone: ZoneKind::Directory.name(),
            reason,
        }
    })?;
    let free_list = FreeListAllocator::try_from(free_list).map_err(|reason| {
        ChainFsError::CorruptMetadata {
            zone: ZoneKind::FreeList.name(),
            reason,
        }
    })?;

    Ok(Some(Metadata {
        directory,
        free_list,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::BlockAllocator;
    use crate::config::ContainerConfig;
    use tempfile::NamedTempFile;

    fn container(temp: &NamedTempFile, config: &ContainerConfig) -> (ContainerFile, ContainerLayout) {
        let layout = config.layout().unwrap();
        let file = ContainerFile::create(temp.path(), layout.total_size()).unwrap();
        (file, layout)
    }

    #[test]
    fn test_blank_container_has_no_metadata() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 16));

        assert!(load(&mut file, &layout).unwrap().is_none());
    }

    #[test]
    fn test_store_and_load() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 16));

        let mut directory = DirectoryTable::new(16);
        let mut free_list = FreeListAllocator::new(16);
        let blocks = free_list.allocate(3).unwrap();
        directory.insert("kept.txt", Some(blocks[0]), 70).unwrap();
        directory.insert("gone.txt", None, 0).unwrap();
        directory.remove("gone.txt").unwrap();

        store(&mut file, &layout, &directory, &free_list).unwrap();

        let metadata = load(&mut file, &layout).unwrap().unwrap();
        assert_eq!(metadata.directory, directory);
        assert_eq!(metadata.free_list, free_list);
    }

    #[test]
    fn test_corrupt_payload_detected() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 16));

        let directory = DirectoryTable::new(16);
        let free_list = FreeListAllocator::new(16);
        store(&mut file, &layout, &directory, &free_list).unwrap();

        // Flip a payload byte in the free-list zone
        let offset = layout.free_list_offset + ZoneHeader::SIZE as u64 + 2;
        let mut byte = [0u8; 1];
        file.read_at(offset, &mut byte).unwrap();
        file.write_at(offset, &[byte[0] ^ 0x20]).unwrap();

        assert!(matches!(
            load(&mut file, &layout),
            Err(ChainFsError::ChecksumMismatch { zone: "free-list" })
        ));
    }

    #[test]
    fn test_overflow_writes_nothing() {
        let temp = NamedTempFile::new().unwrap();
        let config = ContainerConfig {
            directory_zone_size: 128,
            ..ContainerConfig::with_geometry(32, 16)
        };
        let (mut file, layout) = container(&temp, &config);

        let mut directory = DirectoryTable::new(16);
        for i in 0..8 {
            directory
                .insert(&format!("a-rather-long-file-name-{}", i), None, 0)
                .unwrap();
        }
        let free_list = FreeListAllocator::new(16);

        let result = store(&mut file, &layout, &directory, &free_list);
        assert!(matches!(
            result,
            Err(ChainFsError::MetadataOverflow {
                zone: "directory",
                capacity: 128,
                ..
            })
        ));
        assert!(load(&mut file, &layout).unwrap().is_none());
    }

    #[test]
    fn test_half_written_metadata_rejected() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 16));

        let image = encode_zone(&layout, ZoneKind::FreeList, &FreeListAllocator::new(16)).unwrap();
        file.write_at(layout.free_list_offset, &image).unwrap();

        assert!(matches!(
            load(&mut file, &layout),
            Err(ChainFsError::InvalidMagic("directory"))
        ));
    }

    #[test]
    fn test_oversized_table_rejected_before_building() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 16));

        // Checksummed but claiming billions of slots
        let hostile = DirectorySnapshot {
            capacity: u32::MAX,
            slots: Vec::new(),
        };
        let directory = encode_zone(&layout, ZoneKind::Directory, &hostile).unwrap();
        let free_list = encode_zone(&layout, ZoneKind::FreeList, &FreeListAllocator::new(16)).unwrap();
        write(
            &mut file,
            &layout,
            &MetadataImage {
                directory,
                free_list,
            },
        )
        .unwrap();

        assert!(matches!(
            load(&mut file, &layout),
            Err(ChainFsError::LayoutMismatch {
                stored_block_count: u32::MAX,
                block_count: 16,
                ..
            })
        ));
    }

    #[test]
    fn test_inconsistent_snapshot_reported_per_zone() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 4));

        let directory = encode_zone(&layout, ZoneKind::Directory, &DirectoryTable::new(4)).unwrap();
        let doubled = FreeListSnapshot {
            total_blocks: 4,
            stack: vec![1, 1],
        };
        let free_list = encode_zone(&layout, ZoneKind::FreeList, &doubled).unwrap();
        write(
            &mut file,
            &layout,
            &MetadataImage {
                directory,
                free_list,
            },
        )
        .unwrap();

        assert!(matches!(
            load(&mut file, &layout),
            Err(ChainFsError::CorruptMetadata {
                zone: "free-list",
                ..
            })
        ));
    }

    #[test]
    fn test_encode_leaves_container_untouched() {
        let temp = NamedTempFile::new().unwrap();
        let (mut file, layout) = container(&temp, &ContainerConfig::with_geometry(32, 16));

        let image = encode(&layout, &DirectoryTable::new(16), &FreeListAllocator::new(16)).unwrap();
        assert!(image.directory.len() > ZoneHeader::SIZE);
        assert!(load(&mut file, &layout).unwrap().is_none());

        write(&mut file, &layout, &image).unwrap();
        assert!(load(&mut file, &layout).unwrap().is_some());
    }
}
