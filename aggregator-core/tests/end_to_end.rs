//! End-to-end engine properties exercised through the public API.

use std::sync::Arc;
use std::time::Duration;

use aggregator_core::aggregate::{Aggregator, FoldFunction};
use aggregator_core::codec::{BincodeCodec, JsonCodec, RecordCodec};
use aggregator_core::config::{AggregatorConfig, WindowConfig};
use aggregator_core::pipeline::{PartitionProcessor, PipelineBuilder};
use aggregator_core::punctuate::Punctuator;
use aggregator_core::sink::{MemoryDeadLetter, MemorySink};
use aggregator_core::state::{Changelog, MemoryChangelog, PartitionStateStore, StateStore};
use aggregator_core::time::StreamTimeTracker;
use aggregator_core::types::{AggregateKey, Record, WindowId};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Order {
    country: String,
    amount: i64,
}

struct SumAmounts;

impl FoldFunction<Order, i64, i64> for SumAmounts {
    fn create_accumulator(&self) -> i64 {
        0
    }

    fn add(&self, acc: &mut i64, _record: &Record, event: &Order) {
        *acc += event.amount;
    }

    fn get_result(&self, _key: &AggregateKey, acc: i64) -> i64 {
        acc
    }
}

struct RawSum;

impl FoldFunction<i64, i64, i64> for RawSum {
    fn create_accumulator(&self) -> i64 {
        0
    }

    fn add(&self, acc: &mut i64, _record: &Record, event: &i64) {
        *acc += *event;
    }

    fn get_result(&self, _key: &AggregateKey, acc: i64) -> i64 {
        acc
    }
}

fn order_record(country: &str, amount: i64, ts: i64, offset: i64) -> Record {
    let value = serde_json::to_vec(&Order {
        country: country.into(),
        amount,
    })
    .unwrap();
    Record::new(Vec::new(), value, ts, 0, offset)
}

fn raw_record(ts: i64, offset: i64) -> Record {
    Record::new(b"A".to_vec(), Vec::new(), ts, 0, offset)
}

/// Deep-copy a memory changelog at this instant, as a crash would freeze it.
fn snapshot_changelog(changelog: &MemoryChangelog) -> MemoryChangelog {
    let mut copy = MemoryChangelog::new();
    for entry in changelog.clone().replay().unwrap() {
        copy.append(&entry).unwrap();
    }
    copy
}

#[test]
fn test_replay_yields_identical_state_per_key() {
    let fold: Arc<dyn FoldFunction<i64, i64, i64>> = Arc::new(RawSum);
    let aggregator = Aggregator::new(fold);
    let changelog = MemoryChangelog::new();
    let mut store = PartitionStateStore::new(changelog.clone());

    let windows_a = [WindowId::new(0, 60_000)];
    let windows_b = [WindowId::new(60_000, 120_000)];
    aggregator
        .apply(&mut store, &raw_record(10_000, 0), &1, b"A", &windows_a)
        .unwrap();
    aggregator
        .apply(&mut store, &raw_record(40_000, 1), &2, b"A", &windows_a)
        .unwrap();
    aggregator
        .apply(&mut store, &raw_record(65_000, 2), &3, b"B", &windows_b)
        .unwrap();

    let recovered = PartitionStateStore::recover(snapshot_changelog(&changelog)).unwrap();
    assert_eq!(recovered.len(), store.len());
    for key in [
        AggregateKey::new(b"A".to_vec(), windows_a[0]),
        AggregateKey::new(b"B".to_vec(), windows_b[0]),
    ] {
        // Byte-identical accumulator, timestamps, and emission flag.
        assert_eq!(recovered.get(&key).unwrap(), store.get(&key).unwrap());
    }
}

#[test]
fn test_crash_between_emit_and_mark_causes_re_emission() {
    let fold: Arc<dyn FoldFunction<i64, i64, i64>> = Arc::new(RawSum);
    let aggregator = Aggregator::new(fold);
    let changelog = MemoryChangelog::new();
    let mut store = PartitionStateStore::new(changelog.clone());
    let mut tracker = StreamTimeTracker::new(Duration::from_secs(5));
    let codec = BincodeCodec::<i64>::new();

    tracker.observe(10_000).unwrap();
    tracker.observe(40_000).unwrap();
    aggregator
        .apply(
            &mut store,
            &raw_record(10_000, 0),
            &1,
            b"A",
            &[WindowId::new(0, 60_000)],
        )
        .unwrap();
    aggregator
        .apply(
            &mut store,
            &raw_record(40_000, 1),
            &2,
            b"A",
            &[WindowId::new(0, 60_000)],
        )
        .unwrap();
    tracker.observe(65_000).unwrap();

    // The changelog as a crash right before the emitted=true mark became
    // durable would leave it.
    let pre_crash = snapshot_changelog(&changelog);

    // First life: the flush emits 3 and tombstones the entry.
    let sink = MemorySink::new();
    let mut writer = sink.clone();
    let mut punctuator = Punctuator::new(None, None);
    let emitted = punctuator
        .flush(&mut store, &tracker, &aggregator, &codec, &mut writer)
        .unwrap();
    assert_eq!(emitted, 1);

    // Second life: recover from the pre-crash changelog. The entry is still
    // emitted=false and expired, so it is emitted again.
    let mut recovered: Box<dyn StateStore> =
        Box::new(PartitionStateStore::recover(pre_crash).unwrap());
    let mut tracker2 = StreamTimeTracker::new(Duration::from_secs(5));
    tracker2.observe(65_000).unwrap();
    let re_emitted = punctuator
        .flush(
            recovered.as_mut(),
            &tracker2,
            &aggregator,
            &codec,
            &mut writer,
        )
        .unwrap();
    assert_eq!(re_emitted, 1);

    // At-least-once: at least one emission with the correct value; here both
    // carry it.
    let totals: Vec<i64> = sink
        .emissions()
        .iter()
        .map(|(_, value)| codec.decode(value).unwrap())
        .collect();
    assert_eq!(totals, vec![3, 3]);

    // A sink-side dedup by key and window collapses the duplicate.
    use aggregator_core::sink::OutputSink;
    let dedup_sink = MemorySink::new().with_dedup();
    let mut dedup_writer = dedup_sink.clone();
    for (key, value) in sink.emissions() {
        dedup_writer.emit(&key, &value).unwrap();
    }
    assert_eq!(dedup_sink.emissions().len(), 1);
}

#[test]
fn test_hopping_windows_overlapping_emissions() {
    let config = AggregatorConfig::default()
        .with_window(WindowConfig::Hopping {
            size: Duration::from_secs(60),
            advance: Duration::from_secs(30),
        })
        .with_grace(Duration::from_secs(5))
        .with_flush_interval(None);
    let sink = MemorySink::new();
    let sink_for_factory = sink.clone();
    let builder = PipelineBuilder::new(
        config,
        Arc::new(JsonCodec::<Order>::new()),
        Arc::new(JsonCodec::<i64>::new()),
        Arc::new(|order: &Order| Some(order.country.clone().into_bytes())),
        Arc::new(SumAmounts),
    )
    .with_sink_factory(Arc::new(move |_| Box::new(sink_for_factory.clone())))
    .with_dead_letter_factory(Arc::new(|_| Box::new(MemoryDeadLetter::new())));
    let mut pipeline = builder.build(0).unwrap();

    // 45s lands in [0, 60s) and [30s, 90s).
    pipeline.process(order_record("DE", 5, 45_000, 0)).unwrap();
    // 70s lands in [30s, 90s) and [60s, 120s).
    pipeline.process(order_record("DE", 2, 70_000, 1)).unwrap();
    // Push stream time past every window of interest.
    pipeline
        .process(order_record("DE", 0, 200_000, 2))
        .unwrap();

    pipeline.flush().unwrap();
    let totals: Vec<i64> = sink
        .emissions()
        .iter()
        .map(|(_, value)| serde_json::from_slice(value).unwrap())
        .collect();
    // [0, 60s) = 5, [30s, 90s) = 5 + 2, [60s, 120s) = 2, in window-end order.
    assert_eq!(totals, vec![5, 7, 2]);
}
