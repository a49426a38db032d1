#![no_main]

use libfuzzer_sys::fuzz_target;
use pescope::PeImage;

fuzz_target!(|data: &[u8]| {
    let Ok(image) = PeImage::from_mem(data.to_vec()) else {
        return;
    };

    for (index, section) in image.sections().iter().enumerate() {
        let _ = image.section_data_by_index(index);
        let _ = image.resolve_rva(section.virtual_address);
    }
    let _ = image.resolve_rva(image.entry_point());
    let _ = image.data_directories().count();

    let _ = image.exports();
    let _ = image.imports();
    let _ = image.resources();
    let _ = image.relocations();
    let _ = image.debug();
});
