#![no_main]
use chainfs::{ContainerConfig, FileSystem};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes over the metadata zones must fail cleanly, never panic
fuzz_target!(|data: &[u8]| {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let path = dir.path().join("fuzz.bin");
    let config = ContainerConfig::with_geometry(32, 16);

    match FileSystem::create_new(&path, config.clone()) {
        Ok(fs) => drop(fs),
        Err(_) => return,
    }

    let mut image = match std::fs::read(&path) {
        Ok(image) => image,
        Err(_) => return,
    };
    let (dir_bytes, free_bytes) = data.split_at(data.len() / 2);
    let dir_bytes = &dir_bytes[..dir_bytes.len().min(1024)];
    let free_bytes = &free_bytes[..free_bytes.len().min(1024)];
    let free_offset = config.directory_zone_size as usize;
    image[..dir_bytes.len()].copy_from_slice(dir_bytes);
    image[free_offset..free_offset + free_bytes.len()].copy_from_slice(free_bytes);
    if std::fs::write(&path, &image).is_err() {
        return;
    }

    if let Ok(fs) = FileSystem::open(&path, config) {
        for entry in fs.list() {
            let _ = fs.read(&entry.filename);
        }
        let _ = fs.verify();
    }
});
