//! Demo runner: windowed order totals per country over an in-memory log.
//!
//! Generates synthetic order records, routes them to partitions by country,
//! and runs the full engine: decode, window assignment, fold, changelog,
//! punctuation, emission. Aggregates are printed as they are published.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use aggregator_core::aggregate::FoldFunction;
use aggregator_core::codec::JsonCodec;
use aggregator_core::config::{AggregatorConfig, StoreBackend, WindowConfig};
use aggregator_core::partition::{PartitionCoordinator, PartitionPhase, WorkerFactory};
use aggregator_core::pipeline::{PartitionProcessor, PipelineBuilder};
use aggregator_core::sink::{channel_sink, MemoryDeadLetter};
use aggregator_core::source::{partition_for_key, LogSource, MemoryLogSource};
use aggregator_core::state::{compact, Changelog, FsChangelog};
use aggregator_core::types::{AggregateKey, PartitionId, Record};

#[derive(Parser, Debug)]
#[command(name = "aggregator")]
#[command(about = "Partitioned windowed aggregation demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the order-aggregation demo end to end.
    Demo {
        #[arg(long, default_value_t = 2)]
        partitions: usize,
        #[arg(long, default_value_t = 200)]
        orders: usize,
        #[arg(long, default_value_t = 60)]
        window_secs: u64,
        #[arg(long, default_value_t = 5)]
        grace_secs: u64,
        #[arg(long, default_value_t = 200)]
        flush_interval_ms: u64,
        /// Keep changelogs on disk under this directory instead of in memory.
        #[arg(long)]
        store_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Replay on-disk changelogs and summarize what they hold.
    Inspect {
        #[arg(long)]
        store_dir: PathBuf,
        #[arg(long, default_value_t = 2)]
        partitions: usize,
    },
}

/// One order as produced upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    order_id: String,
    timestamp: i64,
    country: String,
    amount: f64,
}

/// One emitted aggregate: the running total for a country in one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AggregatedOrder {
    country: String,
    window_start_ms: i64,
    total_amount: f64,
}

struct SumOrderAmounts;

impl FoldFunction<Order, f64, AggregatedOrder> for SumOrderAmounts {
    fn create_accumulator(&self) -> f64 {
        0.0
    }

    fn add(&self, acc: &mut f64, _record: &Record, event: &Order) {
        *acc += event.amount;
    }

    fn get_result(&self, key: &AggregateKey, acc: f64) -> AggregatedOrder {
        AggregatedOrder {
            country: String::from_utf8_lossy(&key.business_key).into_owned(),
            window_start_ms: key.window.start,
            total_amount: acc,
        }
    }
}

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    match Cli::parse().command {
        Commands::Demo {
            partitions,
            orders,
            window_secs,
            grace_secs,
            flush_interval_ms,
            store_dir,
            seed,
        } => run_demo(
            partitions,
            orders,
            window_secs,
            grace_secs,
            flush_interval_ms,
            store_dir,
            seed,
        ),
        Commands::Inspect {
            store_dir,
            partitions,
        } => inspect(store_dir, partitions),
    }
}

fn run_demo(
    partitions: usize,
    orders: usize,
    window_secs: u64,
    grace_secs: u64,
    flush_interval_ms: u64,
    store_dir: Option<PathBuf>,
    seed: u64,
) -> Result<()> {
    const COUNTRIES: &[&str] = &["DE", "FR", "US", "BR", "JP"];

    if partitions == 0 {
        bail!("at least one partition is required");
    }

    let config = AggregatorConfig::default()
        .with_window(WindowConfig::Tumbling {
            size: Duration::from_secs(window_secs),
        })
        .with_grace(Duration::from_secs(grace_secs))
        .with_flush_interval(Some(Duration::from_millis(flush_interval_ms)))
        .with_store_backend(match &store_dir {
            Some(dir) => StoreBackend::Filesystem { dir: dir.clone() },
            None => StoreBackend::Memory,
        });

    // Emissions flow through one bounded channel; the capacity is the
    // in-flight cap that backpressures the punctuator.
    let (emission_sink, emissions) = channel_sink(config.emission_inflight_cap);
    let printer = std::thread::spawn(move || {
        for (_, value) in emissions.iter() {
            match serde_json::from_slice::<AggregatedOrder>(&value) {
                Ok(agg) => tracing::info!(
                    "published aggregate: country={} window_start_ms={} total={:.2}",
                    agg.country,
                    agg.window_start_ms,
                    agg.total_amount
                ),
                Err(err) => tracing::warn!("unreadable emission: {err}"),
            }
        }
    });

    let builder = PipelineBuilder::new(
        config,
        Arc::new(JsonCodec::<Order>::new()),
        Arc::new(JsonCodec::<AggregatedOrder>::new()),
        Arc::new(|order: &Order| {
            if order.country.is_empty() {
                None
            } else {
                Some(order.country.clone().into_bytes())
            }
        }),
        Arc::new(SumOrderAmounts),
    )
    .with_sink_factory({
        let emission_sink = emission_sink.clone();
        Arc::new(move |_| Box::new(emission_sink.clone()))
    })
    .with_dead_letter_factory(Arc::new(|_| Box::new(MemoryDeadLetter::new())));

    let sources: HashMap<PartitionId, MemoryLogSource> = (0..partitions)
        .map(|p| (p as PartitionId, MemoryLogSource::new(p as PartitionId)))
        .collect();
    let factory: WorkerFactory = {
        let sources = sources.clone();
        Arc::new(move |partition| {
            let source = sources.get(&partition).cloned().ok_or_else(|| {
                aggregator_core::error::AggregateError::Replay(format!(
                    "no input source for partition {partition}"
                ))
            })?;
            let pipeline = builder.build(partition)?;
            Ok((
                Box::new(source) as Box<dyn LogSource>,
                Box::new(pipeline) as Box<dyn PartitionProcessor>,
            ))
        })
    };

    let poll_batch_size = 256;
    let mut coordinator = PartitionCoordinator::new(factory, poll_batch_size);
    for partition in 0..partitions {
        coordinator.assign(partition as PartitionId, 1)?;
    }
    for partition in 0..partitions {
        if !coordinator.wait_for_phase(
            partition as PartitionId,
            PartitionPhase::Active,
            Duration::from_secs(10),
        ) {
            bail!(
                "partition {partition} failed to activate: {:?}",
                coordinator.failures()
            );
        }
    }

    // Produce synthetic orders, routed to partitions by country.
    let mut rng = seed;
    let mut event_time: i64 = 0;
    let mut last_offset: HashMap<PartitionId, i64> = HashMap::new();
    for i in 0..orders {
        let country = COUNTRIES[(lcg_next(&mut rng) % COUNTRIES.len() as u64) as usize];
        let amount = (lcg_next(&mut rng) % 10_000) as f64 / 100.0;
        event_time += (lcg_next(&mut rng) % 5_000) as i64;
        let order = Order {
            order_id: format!("order-{i}"),
            timestamp: event_time,
            country: country.to_string(),
            amount,
        };
        let partition = partition_for_key(country.as_bytes(), partitions);
        let offset = sources[&partition].push(
            Vec::new(),
            serde_json::to_vec(&order).context("encode order")?,
            event_time,
        );
        last_offset.insert(partition, offset);
    }
    tracing::info!(orders, "produced all orders, waiting for consumption");

    let deadline = Instant::now() + Duration::from_secs(30);
    for (partition, offset) in &last_offset {
        loop {
            if sources[partition].committed() >= Some(*offset) {
                break;
            }
            if Instant::now() >= deadline {
                bail!("partition {partition} did not finish consuming in time");
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    // Revoke everything; each worker drains its punctuator on the way out,
    // emitting every window that is already complete.
    coordinator.shutdown(Duration::from_secs(10));
    drop(coordinator);
    drop(emission_sink);
    printer.join().expect("emission printer thread");

    tracing::info!("demo complete");
    Ok(())
}

fn inspect(store_dir: PathBuf, partitions: usize) -> Result<()> {
    for partition in 0..partitions {
        let mut changelog = FsChangelog::open(&store_dir, partition as PartitionId)
            .with_context(|| format!("open changelog for partition {partition}"))?;
        let entries = changelog
            .replay()
            .with_context(|| format!("replay changelog for partition {partition}"))?;
        let live = compact(entries.clone());
        println!(
            "partition {partition}: {} changelog entries, {} live keys",
            entries.len(),
            live.len()
        );
        let mut keys: Vec<&AggregateKey> = live.keys().collect();
        keys.sort();
        for key in keys {
            let state = &live[key];
            println!(
                "  key={} window={} emitted={}",
                String::from_utf8_lossy(&key.business_key),
                key.window,
                state.emitted
            );
        }
    }
    Ok(())
}
