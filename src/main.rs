use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use search_indexer::config::Config;
use search_indexer::economics::GasPriceFeeCalculator;
use search_indexer::interfaces::InMemoryLogCache;
use search_indexer::modules::logsevents::NftLogsProcessor;
use search_indexer::modules::transactions::{
    serialize_prepared_results, ArgsTransactionsProcessor, TransactionsProcessor,
};
use search_indexer::sharding::{Bech32AddressCodec, MaskShardCoordinator};
use search_indexer::types::block::{Body, Header, TransactionPool, TxLog};

/// One block as delivered by the node: header, body, raw pool and the event
/// logs cached for this block's transactions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockEnvelope {
    header: Header,
    body: Body,
    #[serde(default)]
    pool: TransactionPool,
    #[serde(default)]
    logs: BTreeMap<String, TxLog>,
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::var("INDEXER_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path).expect("failed to read the config file");
            serde_json::from_str::<Config>(&raw).expect("failed to parse the config file")
        }
        Err(_) => Config::default(),
    };

    let address_codec =
        Arc::new(Bech32AddressCodec::new(&config.address_hrp).expect("invalid address prefix"));
    let shard_coordinator =
        Arc::new(MaskShardCoordinator::new(&config.shard).expect("invalid shard config"));
    let fee_calculator = Arc::new(GasPriceFeeCalculator::new(&config.economics));

    let processor = TransactionsProcessor::new(ArgsTransactionsProcessor {
        address_codec: address_codec.clone(),
        shard_coordinator: shard_coordinator.clone(),
        fee_calculator,
        is_import_mode: config.shard.is_import_mode,
    });
    let logs_processor = NftLogsProcessor::new(address_codec, shard_coordinator);

    let mut raw_envelope = String::new();
    std::io::stdin()
        .read_to_string(&mut raw_envelope)
        .expect("failed to read the block envelope from stdin");
    let envelope: BlockEnvelope =
        serde_json::from_str(&raw_envelope).expect("failed to parse the block envelope");

    let mut results = processor
        .prepare_transactions(&envelope.body, &envelope.header, &envelope.pool)
        .expect("failed to prepare the block");

    let log_cache = InMemoryLogCache::new(envelope.logs);
    logs_processor.process_logs_for_transactions(
        &mut results.transactions,
        &log_cache,
        &mut results.altered_accounts,
    );
    logs_processor.process_logs_for_scrs(
        &mut results.sc_results,
        &log_cache,
        &mut results.altered_accounts,
    );

    let buffers = serialize_prepared_results(
        &results,
        processor.self_shard_id(),
        config.limits.bulk_request_max_size,
    )
    .expect("failed to serialize the block");

    for buffer in buffers {
        print!("{}", buffer);
    }
}
