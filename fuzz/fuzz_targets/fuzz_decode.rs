#![no_main]
use libfuzzer_sys::fuzz_target;
use zenfreeimage::{Limits, Request};

fuzz_target!(|data: &[u8]| {
    let formats = zenfreeimage::registry();
    if formats.is_empty() {
        return;
    }
    let limits = Limits {
        max_pixels: Some(1 << 22),
        max_memory_bytes: Some(1 << 26),
        ..Default::default()
    };
    let request = Request::from_bytes("fuzz", data.to_vec());

    // Sniffed format first, then every other reader: must never panic or leak
    if let Some(format) = formats.find_reader(&request) {
        let _ = format.reader().with_limits(&limits).read_pixels(&request, enough::Unstoppable);
    }
    for format in formats.iter().take(8) {
        let _ = format.reader().with_limits(&limits).read_info(&request, enough::Unstoppable);
    }
});
