use proptest::prelude::*;
use mangoseed::import::{ImportSettings, Importer, RecordFramer, parse_record};
use mangoseed::progress;
use mangoseed::store::MemoryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

// true = well-formed record, false = broken one
fn seed_text(kinds: &[bool]) -> String {
    let mut out = String::new();
    for (i, ok) in kinds.iter().enumerate() {
        if *ok {
            out.push_str(&format!("{{\n  \"_id\": {i},\n  \"n\": {}\n}}\n", i * 7));
        } else {
            out.push_str(&format!("{{\n  \"_id\": {i},\n  \"n\": \n}}\n"));
        }
        if i % 3 == 0 {
            out.push_str("// note\n");
        }
    }
    out
}

proptest! {
    #[test]
    fn prop_good_records_land_and_bad_ones_are_reported(
        kinds in proptest::collection::vec(any::<bool>(), 0..60),
        batch_size in 1usize..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("things.json");
        std::fs::write(&file, seed_text(&kinds)).unwrap();
        let good = kinds.iter().filter(|k| **k).count();
        let bad = kinds.len() - good;

        let store = MemoryStore::new();
        let (sink, mut rx) = progress::channel();
        let settings = ImportSettings { batch_size, ..ImportSettings::default() };
        let report = runtime().block_on(
            Importer::new(Arc::new(store.clone()))
                .import_report("db", vec![file], &settings, &sink, &CancellationToken::new()),
        ).unwrap();

        prop_assert_eq!(report.records as usize, good);
        prop_assert_eq!(report.malformed as usize, bad);
        prop_assert_eq!(store.count("db", "things"), good);
        prop_assert_eq!(report.per_file[0].batches as usize, good.div_ceil(batch_size));
        prop_assert_eq!(store.stats().insert_calls as usize, good.div_ceil(batch_size));
        let failures = progress::drain(&mut rx).into_iter().filter(|e| !e.is_success).count();
        prop_assert_eq!(failures, bad);
    }

    #[test]
    fn prop_framer_never_loses_records(ids in proptest::collection::vec(any::<i64>(), 0..40)) {
        let text: String = ids.iter().map(|i| format!("{{\"_id\": {i}}}\n  \n")).collect();
        let pending = RecordFramer::frame_all(&text);
        prop_assert_eq!(pending.len(), ids.len());
        for (p, id) in pending.iter().zip(&ids) {
            let doc = parse_record(&p.text).unwrap();
            let got = match doc.get("_id") {
                Some(bson::Bson::Int32(v)) => Some(i64::from(*v)),
                Some(bson::Bson::Int64(v)) => Some(*v),
                _ => None,
            };
            prop_assert_eq!(got, Some(*id));
        }
    }
}
