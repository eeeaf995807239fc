#![no_main]
use libfuzzer_sys::fuzz_target;
use zenfreeimage::Request;

fuzz_target!(|data: &[u8]| {
    let formats = zenfreeimage::registry();
    // First line is the name hint, the rest is content
    let (name, content) = match data.iter().position(|&b| b == b'\n') {
        Some(i) => (&data[..i], &data[i + 1..]),
        None => (data, &[][..]),
    };
    let request = Request::from_bytes(String::from_utf8_lossy(name), content.to_vec());

    let readers = formats.iter().filter(|d| d.can_read(&request)).count();
    let writers = formats.iter().filter(|d| d.can_save(&request)).count();
    assert!(readers <= 1, "{readers} formats claim the same read request");
    assert!(writers <= 1, "{writers} formats claim the same write request");
});
