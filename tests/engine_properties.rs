//! End-to-end engine behaviour
//!
//! Content boundaries, space accounting, failure atomicity and
//! defragmentation layout, checked through the public API only.

use chainfs::{ChainFsError, ContainerConfig, FileSystem, BLOCK_SIZE};
use tempfile::TempDir;

// 16-byte blocks carry 12 payload bytes
const SMALL_BLOCK: u32 = 16;
const SMALL_CAPACITY: usize = 12;

fn small_fs(blocks: u32) -> (TempDir, FileSystem) {
    let dir = tempfile::tempdir().unwrap();
    let fs = FileSystem::create_new(
        dir.path().join("small.bin"),
        ContainerConfig::with_geometry(SMALL_BLOCK, blocks),
    )
    .unwrap();
    (dir, fs)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

#[test]
fn test_boundary_lengths_default_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs =
        FileSystem::create_new(dir.path().join("File_system.bin"), ContainerConfig::default())
            .unwrap();

    let capacity = BLOCK_SIZE as usize - 4;
    assert_eq!(fs.block_capacity(), capacity);

    let cases = [
        (0, 0),
        (1, 1),
        (capacity - 1, 1),
        (capacity, 1),
        (capacity + 1, 2),
        (capacity * 5 + 17, 6),
    ];

    for (len, blocks) in cases {
        let name = format!("len-{}", len);
        let content = pattern(len);
        fs.create(&name, &content).unwrap();

        assert_eq!(fs.read(&name).unwrap(), content, "content of {}", name);
        assert_eq!(fs.chain_blocks(&name).unwrap().len(), blocks, "blocks of {}", name);
        assert_eq!(fs.entry(&name).unwrap().file_size, len as u64);
    }

    assert!(fs.verify().unwrap().is_consistent());
}

#[test]
fn test_embedded_zero_truncates_read() {
    let (_dir, mut fs) = small_fs(8);

    fs.create("single", b"abc\0def").unwrap();
    assert_eq!(fs.read("single").unwrap(), b"abc");

    // Zero in the second block: first block survives whole
    let mut content = vec![b'x'; SMALL_CAPACITY];
    content.extend_from_slice(b"ab\0cd");
    content.extend_from_slice(&[b'y'; SMALL_CAPACITY]);
    fs.create("multi", &content).unwrap();

    let mut expected = vec![b'x'; SMALL_CAPACITY];
    expected.extend_from_slice(b"ab");
    assert_eq!(fs.read("multi").unwrap(), expected);

    // Recorded size and chain are still the full content's
    assert_eq!(fs.entry("multi").unwrap().file_size, content.len() as u64);
    assert_eq!(fs.chain_blocks("multi").unwrap().len(), 3);
}

#[test]
fn test_delete_reclaims_every_block() {
    let (_dir, mut fs) = small_fs(10);
    fs.create("keeper", b"stays").unwrap();

    let free_before = fs.stats().free_blocks;
    fs.create("victim", &pattern(40)).unwrap();
    let chain = fs.chain_blocks("victim").unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(fs.stats().free_blocks, free_before - 4);

    fs.delete("victim").unwrap();

    assert!(!fs.exists("victim"));
    assert!(fs.list().iter().all(|e| e.filename != "victim"));
    assert_eq!(fs.stats().free_blocks, free_before);
    assert_eq!(fs.read("keeper").unwrap(), b"stays");
    assert!(fs.verify().unwrap().is_consistent());
}

#[test]
fn test_append_concatenates() {
    let (_dir, mut fs) = small_fs(8);

    fs.create("letters", b"ab").unwrap();
    fs.append("letters", b"cd").unwrap();
    assert_eq!(fs.read("letters").unwrap(), b"abcd");
    assert_eq!(fs.entry("letters").unwrap().file_size, 4);

    // Across a block boundary
    fs.append("letters", &pattern(20)).unwrap();
    let mut expected = b"abcd".to_vec();
    expected.extend_from_slice(&pattern(20));
    assert_eq!(fs.read("letters").unwrap(), expected);
    assert_eq!(fs.chain_blocks("letters").unwrap().len(), 2);
}

#[test]
fn test_create_insufficient_space_commits_nothing() {
    let (_dir, mut fs) = small_fs(4);
    fs.create("partial", &pattern(20)).unwrap();

    let before = fs.stats();
    let result = fs.create("too-big", &pattern(SMALL_CAPACITY * 3));

    assert!(matches!(
        result,
        Err(ChainFsError::InsufficientSpace {
            needed: 3,
            available: 2
        })
    ));
    assert_eq!(fs.stats(), before);
    assert!(!fs.exists("too-big"));
}

#[test]
fn test_append_insufficient_space_keeps_original() {
    let (_dir, mut fs) = small_fs(3);
    fs.create("grow", &pattern(20)).unwrap();
    fs.create("other", b"x").unwrap();

    // Would need 3 blocks; only the 2 old ones come back
    let result = fs.append("grow", &pattern(10));
    assert!(matches!(result, Err(ChainFsError::InsufficientSpace { .. })));

    assert_eq!(fs.read("grow").unwrap(), pattern(20));
    assert_eq!(fs.stats().free_blocks, 0);
    assert!(fs.verify().unwrap().is_consistent());
}

#[test]
fn test_duplicate_create_leaves_original() {
    let (_dir, mut fs) = small_fs(8);
    fs.create("name", b"first").unwrap();
    let free = fs.stats().free_blocks;

    let result = fs.create("name", b"second version");
    assert!(matches!(result, Err(ChainFsError::AlreadyExists(ref n)) if n == "name"));

    assert_eq!(fs.read("name").unwrap(), b"first");
    assert_eq!(fs.stats().free_blocks, free);
}

#[test]
fn test_defragment_packs_in_slot_order() {
    let (_dir, mut fs) = small_fs(32);

    for i in 0..6 {
        fs.create(&format!("file-{}", i), &pattern(5 + i * 9)).unwrap();
    }
    fs.delete("file-1").unwrap();
    fs.delete("file-4").unwrap();
    fs.append("file-0", &pattern(30)).unwrap();
    fs.create("late", &pattern(25)).unwrap();
    fs.create("hollow", b"").unwrap();

    let contents: Vec<(String, Vec<u8>)> = fs
        .list()
        .into_iter()
        .map(|e| {
            let content = fs.read(&e.filename).unwrap();
            (e.filename, content)
        })
        .collect();
    let used_before = fs.stats().used_blocks;

    let report = fs.defragment().unwrap();
    assert_eq!(report.files, contents.len());
    assert_eq!(report.blocks, used_before);

    // Same files, same bytes
    let mut listed: Vec<String> = fs.list().into_iter().map(|e| e.filename).collect();
    let rewrite_order: Vec<String> = contents.iter().map(|(n, _)| n.clone()).collect();
    let mut expected_names = rewrite_order.clone();
    listed.sort();
    expected_names.sort();
    assert_eq!(listed, expected_names);
    for (name, content) in &contents {
        assert_eq!(&fs.read(name).unwrap(), content, "content of {}", name);
    }

    // Chains laid end to end from block 0, in the pre-defragment slot order
    let layout: Vec<u32> = rewrite_order
        .iter()
        .flat_map(|name| fs.chain_blocks(name).unwrap())
        .collect();
    let expected: Vec<u32> = (0..used_before as u32).collect();
    assert_eq!(layout, expected);

    assert_eq!(fs.stats().free_blocks, 32 - used_before);
    assert!(fs.verify().unwrap().is_consistent());
}

#[test]
fn test_defragment_empty_container() {
    let (_dir, mut fs) = small_fs(4);
    let report = fs.defragment().unwrap();
    assert_eq!(report.files, 0);
    assert_eq!(report.blocks, 0);
    assert_eq!(fs.stats().free_blocks, 4);
}

#[test]
fn test_directory_fills_up() {
    let (_dir, mut fs) = small_fs(5);

    for i in 0..5 {
        fs.create(&format!("f{}", i), b"").unwrap();
    }

    let result = fs.create("one-too-many", b"");
    assert!(matches!(result, Err(ChainFsError::TableFull)));
    assert_eq!(fs.list().len(), 5);

    // A deleted slot becomes usable again
    fs.delete("f2").unwrap();
    fs.create("one-too-many", b"fits").unwrap();
    assert_eq!(fs.read("one-too-many").unwrap(), b"fits");
}

#[test]
fn test_list_in_slot_order() {
    let (_dir, mut fs) = small_fs(8);

    // Single-byte names hash to their byte value mod 8
    fs.create("c", b"3").unwrap(); // 99 % 8 = 3
    fs.create("a", b"1").unwrap(); // 97 % 8 = 1
    fs.create("k", b"3").unwrap(); // 107 % 8 = 3, probes to 4

    let names: Vec<String> = fs.list().into_iter().map(|e| e.filename).collect();
    assert_eq!(names, vec!["a", "c", "k"]);
}
