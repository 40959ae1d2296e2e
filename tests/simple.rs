use disk_sorted::{sort, sort_by_key, Error, JsonLines, Pod, Result, SortConfig};
use log::debug;
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const INITIAL: [i32; 10] = [1, 10, 2, 9, 3, 8, 4, 7, 5, 6];

#[test]
fn test_simple() -> Result<()> {
    init_logger();

    let expected: Vec<i32> = (1..=10).collect();
    let descending: Vec<i32> = expected.iter().rev().copied().collect();
    let config = || SortConfig::new().chunk_size(4);

    let output = sort(INITIAL, config())?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, expected);

    let output = sort(INITIAL, config().reverse(true))?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, descending);

    let output = sort_by_key(INITIAL, |x: &i32| -x, config())?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, descending);

    let output =
        sort_by_key(INITIAL, |x: &i32| -x, config().reverse(true))?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, expected);

    Ok(())
}

#[test]
fn test_cornercases() {
    init_logger();

    let output = sort(Vec::<i32>::new(), SortConfig::new())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();
    assert!(output.is_empty());

    let err = sort(Vec::<i32>::new(), SortConfig::new().chunk_size(0)).err();
    assert!(matches!(err, Some(Error::InvalidArgument(_))));
}

#[test]
fn test_medium() -> Result<()> {
    init_logger();

    let size = 10_000;
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut initial: Vec<u32> = (0..size).collect();
    initial.shuffle(&mut rng);

    let t = Instant::now();
    let output = sort(initial, SortConfig::new().chunk_size(1000))?;
    assert!(!output.is_in_memory());

    let mut prev = None;
    let mut count = 0;
    for res in output {
        let value = res?;
        if let Some(p) = prev {
            assert!(p < value);
        }
        prev = Some(value);
        count += 1;
    }
    assert_eq!(count, size);
    assert_eq!(prev, Some(size - 1));
    debug!("Time elapsed: {:?}", t.elapsed());

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    value: u32,
    label: String,
}

#[test]
fn test_objects() -> Result<()> {
    init_logger();

    let mut rng = SmallRng::seed_from_u64(7);
    let mut initial: Vec<Record> = (0..1000)
        .map(|value| Record {
            value,
            label: format!("record-{value}"),
        })
        .collect();
    initial.shuffle(&mut rng);

    let output = sort_by_key(initial, |r: &Record| r.value, SortConfig::new().chunk_size(500))?
        .collect::<Result<Vec<_>>>()?;
    let values: Vec<u32> = output.iter().map(|r| r.value).collect();
    assert_eq!(values, (0..1000).collect::<Vec<_>>());
    assert!(output.iter().all(|r| r.label == format!("record-{}", r.value)));

    Ok(())
}

#[test]
fn test_serialize_json() -> Result<()> {
    init_logger();

    let config = SortConfig::new().serializer(JsonLines);
    let output = sort((0..10).rev(), config.clone().chunk_size(4))?.collect::<Result<Vec<i32>>>()?;
    assert_eq!(output, (0..10).collect::<Vec<_>>());

    let unicode = vec![
        "apple".to_string(),
        "\u{e1}\u{e9}\u{fa}\u{171}\u{151}".to_string(),
    ];
    let output = sort(unicode.clone(), config.chunk_size(1))?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, unicode);

    Ok(())
}

#[test]
fn test_serialize_pod() -> Result<()> {
    init_logger();

    let config = SortConfig::new().serializer(Pod).chunk_size(4);
    let output = sort((0..10u64).rev(), config.clone())?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, (0..10).collect::<Vec<_>>());

    let pairs = vec![[3i16, 0], [1, 9], [2, -1], [1, 2], [0, 0]];
    let output = sort(pairs, config)?.collect::<Result<Vec<_>>>()?;
    assert_eq!(output, [[0, 0], [1, 2], [1, 9], [2, -1], [3, 0]]);

    Ok(())
}

#[test]
fn test_non_finite_float_fails_with_json() {
    init_logger();

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Reading {
        id: u32,
        value: f64,
    }

    let readings = (0..8).map(|id| Reading {
        id,
        value: if id == 5 { f64::NAN } else { id as f64 },
    });
    let config = SortConfig::new().serializer(JsonLines).chunk_size(2);
    let result: Result<Vec<_>> = sort_by_key(readings, |r: &Reading| r.id, config)
        .and_then(|sorted| sorted.collect());
    assert!(matches!(
        result,
        Err(Error::Serialization {
            codec: "json-lines",
            ..
        })
    ));
}

#[test]
fn test_temp_dir() -> Result<()> {
    init_logger();

    let dir = tempfile::tempdir()?;
    let config = SortConfig::new()
        .chunk_size(3)
        .sub_batch_size(2)
        .io_buffer_bytes(64)
        .temp_dir(dir.path());
    let output = sort(vec![5, 4, 3, 2, 1, 0], config)?.collect::<Result<Vec<i64>>>()?;
    assert_eq!(output, [0, 1, 2, 3, 4, 5]);

    // anonymous scratch files leave nothing behind
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

    Ok(())
}
