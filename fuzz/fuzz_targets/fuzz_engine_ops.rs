#![no_main]
use chainfs::{ContainerConfig, FileSystem};
use libfuzzer_sys::{
    arbitrary::{Arbitrary, Unstructured},
    fuzz_target,
};

#[derive(Debug, Arbitrary)]
enum Op {
    Create { name_idx: u8, data: Vec<u8> },
    Append { name_idx: u8, data: Vec<u8> },
    Delete { name_idx: u8 },
    Read { name_idx: u8 },
    Defragment,
}

// Random operation sequences must never leave a leaked or double-owned block
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<Op> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let mut fs = match FileSystem::create_new(
        dir.path().join("fuzz.bin"),
        ContainerConfig::with_geometry(32, 24),
    ) {
        Ok(fs) => fs,
        Err(_) => return,
    };

    for op in ops.iter().take(64) {
        match op {
            Op::Create { name_idx, data } => {
                let _ = fs.create(&format!("f{}", name_idx % 16), data);
            }
            Op::Append { name_idx, data } => {
                let _ = fs.append(&format!("f{}", name_idx % 16), data);
            }
            Op::Delete { name_idx } => {
                let _ = fs.delete(&format!("f{}", name_idx % 16));
            }
            Op::Read { name_idx } => {
                let _ = fs.read(&format!("f{}", name_idx % 16));
            }
            Op::Defragment => {
                fs.defragment().unwrap();
            }
        }

        let report = fs.verify().unwrap();
        assert!(report.is_consistent(), "{:?}", report);
    }
});
