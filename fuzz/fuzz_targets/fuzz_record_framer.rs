#![no_main]
use libfuzzer_sys::fuzz_target;
use mangoseed::import::{RecordFramer, parse_record};

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    let s = match std::str::from_utf8(data) { Ok(x) => x, Err(_) => return };
    let mut last_line = 0;
    for pending in RecordFramer::frame_all(s) {
        // Records come out in order and never contain only whitespace.
        assert!(pending.start_line > last_line);
        assert!(!pending.text.trim().is_empty());
        last_line = pending.start_line;
        if let Ok(doc) = parse_record(&pending.text) {
            assert!(doc.contains_key("_id"));
        }
    }
});
