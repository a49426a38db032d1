//! End-to-end decoding of synthesized images through the public API.

#[path = "../src/test/builder.rs"]
mod builder;

use builder::PeBuilder;
use pescope::prelude::*;

fn put(data: &mut Vec<u8>, values: &[u32]) {
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
}

fn put16(data: &mut Vec<u8>, values: &[u16]) {
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
}

/// `demo.dll` exporting `Open` (ordinal 1) and `Close` (ordinal 2).
fn export_section() -> Vec<u8> {
    let base = 0x2000;
    let mut data = Vec::new();
    put(&mut data, &[0, 0x6000_0000]);
    put16(&mut data, &[0, 0]);
    put(
        &mut data,
        &[base + 60, 1, 2, 2, base + 40, base + 48, base + 56],
    );
    // address table
    put(&mut data, &[0x1000, 0x1008]);
    // name table, sorted
    put(&mut data, &[base + 69, base + 75]);
    put16(&mut data, &[1, 0]);
    data.extend_from_slice(b"demo.dll\0Close\0Open\0");
    data
}

/// PE32 imports from `KERNEL32.dll`: `GetTickCount` by name and ordinal 17.
fn import_section() -> Vec<u8> {
    let base = 0x3000;
    let mut data = Vec::new();
    put(&mut data, &[base + 40, 0, 0, base + 64, base + 52]);
    put(&mut data, &[0; 5]);
    for _ in 0..2 {
        put(&mut data, &[base + 77, 0x8000_0000 | 17, 0]);
    }
    data.extend_from_slice(b"KERNEL32.dll\0");
    put16(&mut data, &[0x100]);
    data.extend_from_slice(b"GetTickCount\0");
    data
}

/// `RT_VERSION` / `"INFO"` / `0x409`, one data entry.
fn resource_section() -> Vec<u8> {
    let header = |data: &mut Vec<u8>, named: u16, ids: u16| {
        put(data, &[0, 0]);
        put16(data, &[0, 0, named, ids]);
    };

    let mut data = Vec::new();
    header(&mut data, 0, 1);
    put(&mut data, &[16, 0x8000_0000 | 24]);
    header(&mut data, 1, 0);
    put(&mut data, &[0x8000_0000 | 72, 0x8000_0000 | 48]);
    header(&mut data, 0, 1);
    put(&mut data, &[0x409, 96]);
    data.resize(72, 0);
    put16(&mut data, &[4]);
    for unit in "INFO".encode_utf16() {
        put16(&mut data, &[unit]);
    }
    data.resize(96, 0);
    put(&mut data, &[0x4100, 0x40, 1200, 0]);
    data
}

fn reloc_section() -> Vec<u8> {
    let mut data = Vec::new();
    put(&mut data, &[0x1000, 16]);
    put16(&mut data, &[0x3004, 0x3008, 0x300C, 0x0000]);
    data
}

fn debug_section() -> Vec<u8> {
    let mut data = Vec::new();
    put(&mut data, &[0, 0x6000_0000]);
    put16(&mut data, &[0, 0]);
    put(&mut data, &[2, 0x20, 0x6100, 0]);
    data
}

fn sample_dll() -> Vec<u8> {
    let sections = [
        (".edata", 0x2000, 0, export_section()),
        (".idata", 0x3000, 1, import_section()),
        (".rsrc", 0x4000, 2, resource_section()),
        (".reloc", 0x5000, 5, reloc_section()),
        (".rdata", 0x6000, 6, debug_section()),
    ];

    let mut builder = PeBuilder::pe32()
        .dll()
        .entry_point(0x1000)
        .section_sized(".text", 0x1000, 0x10, vec![0xC3; 0x10], 0x6000_0020);
    for (name, rva, slot, data) in sections {
        let size = data.len() as u32;
        builder = builder.section(name, rva, data).directory(slot, rva, size);
    }
    builder.build()
}

#[test]
fn sample_dll_headers() -> Result<()> {
    let image = PeImage::from_mem(sample_dll())?;

    assert!(image.is_dll());
    assert!(!image.is_64_bit());
    assert_eq!(image.coff_header().machine, MachineType::I386);
    assert!(image
        .coff_header()
        .characteristics
        .contains(FileCharacteristics::DLL));
    assert_eq!(image.sections().len(), 6);
    assert_eq!(image.entry_point(), 0x1000);

    let kinds: Vec<_> = image.data_directories().map(|(kind, _)| kind).collect();
    assert_eq!(
        kinds,
        vec![
            DataDirectoryType::ExportTable,
            DataDirectoryType::ImportTable,
            DataDirectoryType::ResourceTable,
            DataDirectoryType::BaseRelocationTable,
            DataDirectoryType::Debug,
        ]
    );
    Ok(())
}

#[test]
fn sample_dll_directories() -> Result<()> {
    let image = PeImage::from_mem(sample_dll())?;

    let exports = image.exports().unwrap();
    assert_eq!(exports.name, "demo.dll");
    assert_eq!(exports.by_name("Open").map(|f| f.ordinal), Some(1));
    assert_eq!(exports.by_name("Close").map(|f| f.address), Some(0x1008));

    let imports = image.imports().unwrap();
    let kernel32 = imports.module("kernel32.dll").unwrap();
    assert_eq!(
        kernel32.functions,
        vec![
            ImportedFunction::ByName {
                hint: 0x100,
                name: "GetTickCount".to_string()
            },
            ImportedFunction::ByOrdinal(17),
        ]
    );

    let resources = image.resources()?.unwrap();
    let version = &resources.entries()[0];
    assert_eq!(version.id(), Some(16));
    let named = &version.subdirectory().unwrap().entries()[0];
    assert_eq!(named.name(), Some("INFO"));
    let language = &named.subdirectory().unwrap().entries()[0];
    assert_eq!(language.id(), Some(0x409));
    let leaf = language.data().unwrap();
    assert_eq!((leaf.rva, leaf.size, leaf.code_page), (0x4100, 0x40, 1200));

    let relocations = image.relocations().unwrap();
    assert_eq!(relocations.entry_count(), 3);
    assert!(relocations.blocks[0]
        .entries
        .iter()
        .all(|e| e.kind == BaseRelocationType::HighLow));

    let debug = image.debug().unwrap();
    assert_eq!(debug.entries.len(), 1);
    assert_eq!(debug.entries[0].kind, DebugType::CodeView);
    Ok(())
}

#[test]
fn resource_depth_error_is_isolated() -> Result<()> {
    let options = ParseOptions::default().with_max_resource_depth(1);
    let image = PeImage::from_mem_with_options(sample_dll(), options)?;

    assert!(matches!(
        image.resources(),
        Err(Error::ResourceRecursionExceeded(1))
    ));
    // memoized
    assert!(image.resources().is_err());

    assert!(image.exports().is_some());
    assert!(image.imports().is_some());
    assert!(image.relocations().is_some());
    assert!(image.debug().is_some());
    assert_eq!(image.section_data(".rsrc")?.len(), 0x200);

    let strict = PeImage::from_mem_with_options(sample_dll(), ParseOptions::strict())?;
    assert!(strict.resources()?.is_some());
    Ok(())
}

#[test]
fn from_file_matches_from_mem() -> Result<()> {
    let bytes = sample_dll();
    let path = std::env::temp_dir().join(format!("pescope-{}-sample.dll", std::process::id()));
    std::fs::write(&path, &bytes)?;

    let mapped = PeImage::from_file(&path);
    std::fs::remove_file(&path)?;
    let mapped = mapped?;

    let owned = PeImage::from_mem(bytes)?;
    assert_eq!(mapped.headers(), owned.headers());
    assert_eq!(mapped.data(), owned.data());
    assert_eq!(mapped.exports(), owned.exports());
    assert_eq!(mapped.imports(), owned.imports());
    Ok(())
}

#[test]
fn missing_file() {
    let path = std::env::temp_dir().join("pescope-does-not-exist.exe");
    assert!(matches!(PeImage::from_file(path), Err(Error::NotFound(_))));
}

#[test]
fn not_a_pe() {
    let mut bytes = vec![0_u8; 0x100];
    bytes[0..2].copy_from_slice(b"ZM");

    assert!(matches!(
        PeImage::from_mem(bytes),
        Err(Error::InvalidSignature {
            expected: 0x5A4D,
            found: 0x4D5A
        })
    ));
    assert!(PeImage::from_mem(vec![b'M', b'Z'])
        .unwrap_err()
        .is_truncated());
}

#[test]
fn resolver_properties() -> Result<()> {
    let image = PeImage::from_mem(sample_dll())?;

    for section in image.sections() {
        let extent = section.virtual_size.max(section.size_of_raw_data);
        for k in [0, 1, extent / 2, extent - 1] {
            assert_eq!(
                image.resolve_rva(section.virtual_address + k),
                Some(section.pointer_to_raw_data + k)
            );
        }
    }
    assert_eq!(image.resolve_rva(0), None);
    assert_eq!(image.resolve_rva(0x0010_0000), None);
    Ok(())
}
