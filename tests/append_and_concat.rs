//! End-to-end coverage of `FileEngine::open_append` (spec.md §4.5.4) and the
//! concatenated-segment read path it exercises on reopen.

use xcdf::io::{FileStream, SeekReadSource, SeekWriteSink};
use xcdf::{Config, FileEngine};

fn temp_path(name: &str) -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::mem::forget(dir);
    path
}

#[test]
fn append_extends_an_under_full_last_block() {
    let path = temp_path("append.xcdf");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut engine = FileEngine::create_write(SeekWriteSink::new(file), Config::default());
        engine.allocate_u64_field("i", 1, "").unwrap();
        for i in 0..10u64 {
            engine.write(vec![vec![i]]).unwrap();
        }
        engine.close().unwrap();
    }

    {
        let file = std::fs::File::options().read(true).write(true).open(&path).unwrap();
        let mut engine = FileEngine::open_append(FileStream::new(file), Config::default()).unwrap();
        assert_eq!(engine.total_events(), 10);
        for i in 10..15u64 {
            engine.write(vec![vec![i]]).unwrap();
        }
        engine.close().unwrap();
    }

    let file = std::fs::File::open(&path).unwrap();
    let mut engine = FileEngine::open_read(SeekReadSource::new(file), Config::default()).unwrap();
    assert_eq!(engine.total_events(), 15);
    for i in 0..15u64 {
        let rec = engine.read().unwrap().unwrap();
        assert_eq!(rec[0], vec![i]);
    }
    assert!(engine.read().unwrap().is_none());
}

#[test]
fn append_preserves_globals_without_double_counting() {
    let path = temp_path("append_globals.xcdf");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut engine = FileEngine::create_write(SeekWriteSink::new(file), Config::default());
        engine.allocate_u64_field("i", 1, "").unwrap();
        for i in 0..3u64 {
            engine.write(vec![vec![i * 10]]).unwrap();
        }
        engine.close().unwrap();
    }

    {
        let file = std::fs::File::options().read(true).write(true).open(&path).unwrap();
        let mut engine = FileEngine::open_append(FileStream::new(file), Config::default()).unwrap();
        engine.write(vec![vec![5u64]]).unwrap();
        engine.close().unwrap();
    }

    let file = std::fs::File::open(&path).unwrap();
    let mut engine = FileEngine::open_read(SeekReadSource::new(file), Config::default()).unwrap();
    let reports = engine.check_globals().unwrap();
    let i_report = reports.iter().find(|r| r.field_name == "i").unwrap();
    assert_eq!(i_report.globals.raw_global_min, 0);
    assert_eq!(i_report.globals.raw_global_max, 20);
}

#[test]
fn concatenating_two_files_sums_event_counts_and_reads_in_order() {
    let path_a = temp_path("concat_a.xcdf");
    let path_b = temp_path("concat_b.xcdf");
    for (path, base) in [(&path_a, 0u64), (&path_b, 100u64)] {
        let file = std::fs::File::create(path).unwrap();
        let mut engine = FileEngine::create_write(SeekWriteSink::new(file), Config::default());
        engine.allocate_u64_field("i", 1, "").unwrap();
        for j in 0..4u64 {
            engine.write(vec![vec![base + j]]).unwrap();
        }
        engine.close().unwrap();
    }

    let concat_path = temp_path("concat_ab.xcdf");
    let mut bytes = std::fs::read(&path_a).unwrap();
    bytes.extend_from_slice(&std::fs::read(&path_b).unwrap());
    std::fs::write(&concat_path, &bytes).unwrap();

    let file = std::fs::File::open(&concat_path).unwrap();
    let mut engine = FileEngine::open_read(SeekReadSource::new(file), Config::default()).unwrap();
    assert_eq!(engine.total_events(), 8);

    let mut values = Vec::new();
    while let Some(rec) = engine.read().unwrap() {
        values.push(rec[0][0]);
    }
    assert_eq!(values, vec![0, 1, 2, 3, 100, 101, 102, 103]);
}
