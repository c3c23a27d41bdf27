#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(filter) = mangoseed::export::parse_filter(s) {
            let _ = mangoseed::store::validate_filter(&filter);
            let docs = [
                bson::doc!{"_id": 1, "a": 1, "b": 2, "name": "x"},
                bson::doc!{"_id": 2, "a": 10, "b": -5, "name": "y", "nested": {"z": 3}},
                bson::doc!{"_id": 3, "tags": ["p", "q"], "active": true}
            ];
            for d in &docs {
                let _ = mangoseed::store::eval_filter(d, &filter);
                let _ = mangoseed::store::project(d, &filter);
            }
        }
    }
});
