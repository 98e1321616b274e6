#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub address_hrp: String,
    #[serde(default)]
    pub shard: ShardConfig,
    #[serde(default)]
    pub economics: EconomicsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address_hrp: "erd".to_owned(),
            shard: ShardConfig::default(),
            economics: EconomicsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShardConfig {
    pub self_shard_id: u32,
    pub number_of_shards: u32,
    /// Import mode replays historical blocks; cross-shard documents where the
    /// destination is another shard are skipped because that shard already
    /// owns them.
    pub is_import_mode: bool,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            self_shard_id: 0,
            number_of_shards: 3,
            is_import_mode: false,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EconomicsConfig {
    pub min_gas_limit: u64,
    pub gas_per_data_byte: u64,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            min_gas_limit: 50_000,
            gas_per_data_byte: 1_500,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LimitsConfig {
    pub bulk_request_max_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            bulk_request_max_size: 4 * 1024 * 1024,
        }
    }
}
