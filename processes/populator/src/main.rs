//! 'main' for the Agora populator process

use agora_common::{Block, BlockHash, ForkSettings, Header, Input, OutPoint, Output, Transaction};
use agora_module_populator::{Branch, Dispatcher, InMemoryChain, Populator, PopulatorConfig};
use agora_module_tx_pool::TransactionGraph;
use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use std::sync::Arc;
use tracing::{info, warn};

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{filter, fmt, EnvFilter, Registry};

const DEFAULT_CHAIN_HEIGHT: (&str, i64) = ("demo.chain-height", 20);
const CHAIN_HEIGHT_RANGE: (i64, i64) = (4, 100_000);

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, value_name = "PATH", default_values_t = vec!["populator".to_string()])]
    config: Vec<String>,
}

fn coinbase(height: u64) -> Transaction {
    Transaction::new(
        1,
        vec![Input::new(OutPoint::null(), height.to_le_bytes().to_vec(), 0xffff_ffff)],
        vec![Output::new(5_000_000_000, vec![0x51])],
        0,
    )
}

fn spend(outpoints: &[OutPoint], value: u64) -> Transaction {
    Transaction::new(
        1,
        outpoints.iter().map(|outpoint| Input::new(*outpoint, vec![], 0xffff_ffff)).collect(),
        vec![Output::new(value, vec![0x51])],
        0,
    )
}

/// Ten-minute spacing from a fixed start, saturating at the largest timestamp
fn block_timestamp(height: u64) -> u32 {
    u32::try_from(height)
        .ok()
        .and_then(|height| height.checked_mul(600))
        .and_then(|offset| offset.checked_add(1_600_000_000))
        .unwrap_or(u32::MAX)
}

fn block(
    previous: BlockHash,
    settings: &ForkSettings,
    height: u64,
    transactions: Vec<Transaction>,
) -> Block {
    let timestamp = block_timestamp(height);
    Block::new(
        Header {
            version: 1,
            previous_block_hash: previous,
            timestamp,
            ..Header::default()
        },
        transactions,
        settings.context(height, timestamp),
    )
}

/// Confirm coinbase-only blocks up to `height`, returning the tip hash and
/// the coinbase outpoints by height
fn seed_chain(
    chain: &InMemoryChain,
    settings: &ForkSettings,
    height: u64,
) -> (BlockHash, Vec<OutPoint>) {
    let mut previous = BlockHash::default();
    let mut coinbases = Vec::new();

    for h in 0..=height {
        let block = block(previous, settings, h, vec![coinbase(h)]);
        coinbases.push(OutPoint::new(*block.transactions[0].hash(), 0));
        chain.confirm_block(h, &block);
        previous = block.hash();
    }

    (previous, coinbases)
}

/// Standard main
#[tokio::main]
pub async fn main() -> Result<()> {
    let args = Args::parse();

    // Standard logging using RUST_LOG for log levels
    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());

    // Only turn on tracing if some OTEL environment variables exist
    if std::env::vars().any(|(name, _)| name.starts_with("OTEL_")) {
        let otel_exporter = SpanExporter::builder().with_tonic().build()?;
        let otel_tracer = SdkTracerProvider::builder()
            .with_batch_exporter(otel_exporter)
            .build()
            .tracer("rust-otel-otlp");
        let otel_layer = OpenTelemetryLayer::new(otel_tracer)
            .with_filter(
                EnvFilter::from_default_env().add_directive(filter::LevelFilter::INFO.into()),
            )
            .with_filter(filter::filter_fn(|meta| meta.is_span()));
        Registry::default().with(fmt_layer).with(otel_layer).init();
    } else {
        Registry::default().with(fmt_layer).init();
    }

    info!("Agora populator process");

    // Read the config
    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file));
    }
    let config = builder.add_source(Environment::with_prefix("AGORA")).build()?;

    let settings = ForkSettings::from_config(&config)?;
    let populator_config = PopulatorConfig::parse(&config)?;
    let chain_height = config
        .get_int(DEFAULT_CHAIN_HEIGHT.0)
        .unwrap_or(DEFAULT_CHAIN_HEIGHT.1)
        .clamp(CHAIN_HEIGHT_RANGE.0, CHAIN_HEIGHT_RANGE.1) as u64;

    let chain = Arc::new(InMemoryChain::new());
    let (tip, coinbases) = seed_chain(&chain, &settings, chain_height);
    info!(height = chain_height, outputs = chain.len(), "Seeded chain");

    // One worker pool shared by both populators
    let dispatcher = Dispatcher::with_threads(populator_config.threads)?;
    info!(
        threads = dispatcher.size(),
        relay_transactions = populator_config.relay_transactions,
        "Starting populator"
    );
    let populator = Populator::with_dispatcher(
        dispatcher,
        chain.clone(),
        populator_config.relay_transactions,
    );

    // Candidate block spending two confirmed coinbases
    let height = chain_height + 1;
    let mut branch = Branch::new(chain_height);
    if !branch.push_front(block(
        tip,
        &settings,
        height,
        vec![coinbase(height), spend(&coinbases[1..3], 9_000_000_000)],
    )) {
        bail!("Candidate does not link to the chain tip");
    }

    let branch = populator.populate_block(branch).await?;
    let top = branch.top().context("populated branch is empty")?;
    let resolved = top
        .transactions
        .iter()
        .skip(1)
        .flat_map(|tx| tx.inputs())
        .filter(|input| input.prevout.is_cached())
        .count();
    info!(
        height,
        hash = %top.hash(),
        inputs = top.total_inputs(false),
        resolved,
        "Populated candidate block"
    );

    // A pool transaction and a child spending its output
    let mut graph = TransactionGraph::new();
    let forks = settings.forks_at(height);

    let mut parent = spend(&coinbases[3..4], 4_000_000_000);
    parent.validation.state = Some(settings.context(height, 0));
    let parent = populator.populate_transaction(parent).await?;
    chain.pool_transaction(&parent, forks);
    graph.admit(&parent)?;

    let mut child = spend(&[OutPoint::new(*parent.hash(), 0)], 3_999_000_000);
    child.validation.state = Some(settings.context(height, 0));
    let child = populator.populate_transaction(child).await?;
    chain.pool_transaction(&child, forks);
    graph.admit(&child)?;

    info!(
        pooled = graph.len(),
        anchors = graph.anchors().len(),
        descendants = graph.descendants(parent.hash())?.len(),
        child_fees = child.fees(),
        "Pool graph updated"
    );

    match populator.populate_transaction(parent).await {
        Err(error) => info!(%error, "Resubmitted transaction rejected"),
        Ok(tx) => warn!(hash = %tx.hash(), "Resubmitted transaction accepted"),
    }

    // Bye!
    info!("Exiting");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_timestamps_are_spaced() {
        assert_eq!(block_timestamp(0), 1_600_000_000);
        assert_eq!(block_timestamp(2), 1_600_001_200);
    }

    #[test]
    fn block_timestamp_saturates() {
        assert_eq!(block_timestamp(5_000_000), u32::MAX);
        assert_eq!(block_timestamp(u64::MAX), u32::MAX);
    }
}
