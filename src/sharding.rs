use bech32::{FromBase32, ToBase32, Variant};

use crate::config::ShardConfig;
use crate::errors;
use crate::interfaces::{AddressCodec, ShardCoordinator};
use crate::types::block::METACHAIN_SHARD_ID;
use crate::types::Address;

pub const ADDRESS_LEN: usize = 32;

/// Shard assignment over the trailing address byte, using the smallest bit
/// mask that covers the shard count. Addresses whose masked value lands past
/// the last shard fall back to the shorter mask.
#[derive(Debug, Clone)]
pub struct MaskShardCoordinator {
    self_shard_id: u32,
    number_of_shards: u32,
    mask_high: u32,
    mask_low: u32,
}

impl MaskShardCoordinator {
    pub fn new(config: &ShardConfig) -> crate::Result<Self> {
        if config.number_of_shards == 0 {
            return Err(errors::ErrorKind::InvalidConfig(
                "number_of_shards must be at least 1".to_string(),
            )
            .into());
        }

        let is_valid_shard = config.self_shard_id < config.number_of_shards
            || config.self_shard_id == METACHAIN_SHARD_ID;
        if !is_valid_shard {
            return Err(errors::ErrorKind::InvalidConfig(format!(
                "self_shard_id {} is out of range for {} shards",
                config.self_shard_id, config.number_of_shards
            ))
            .into());
        }

        let bits = (config.number_of_shards as f64).log2().ceil() as u32;
        let mask_high = (1u32 << bits) - 1;
        let mask_low = (1u32 << bits.saturating_sub(1)) - 1;

        Ok(Self {
            self_shard_id: config.self_shard_id,
            number_of_shards: config.number_of_shards,
            mask_high,
            mask_low,
        })
    }
}

impl ShardCoordinator for MaskShardCoordinator {
    fn compute_id(&self, address: &Address) -> u32 {
        let last_byte = match address.as_bytes().last() {
            Some(byte) => u32::from(*byte),
            None => return self.self_shard_id,
        };

        let shard = last_byte & self.mask_high;
        if shard < self.number_of_shards {
            shard
        } else {
            last_byte & self.mask_low
        }
    }

    fn self_id(&self) -> u32 {
        self.self_shard_id
    }

    fn number_of_shards(&self) -> u32 {
        self.number_of_shards
    }
}

/// Bech32 form of raw address bytes, the chain's human-readable format.
#[derive(Debug, Clone)]
pub struct Bech32AddressCodec {
    hrp: String,
}

impl Bech32AddressCodec {
    pub fn new(hrp: &str) -> crate::Result<Self> {
        if hrp.is_empty() {
            return Err(errors::ErrorKind::InvalidConfig(
                "address_hrp must not be empty".to_string(),
            )
            .into());
        }

        Ok(Self {
            hrp: hrp.to_owned(),
        })
    }
}

impl AddressCodec for Bech32AddressCodec {
    fn encode(&self, address: &Address) -> crate::Result<String> {
        bech32::encode(&self.hrp, address.as_bytes().to_base32(), Variant::Bech32)
            .map_err(|err| errors::ErrorKind::from(err).into())
    }

    fn decode(&self, encoded: &str) -> crate::Result<Address> {
        let (hrp, data, _) = bech32::decode(encoded).map_err(errors::ErrorKind::from)?;
        if hrp != self.hrp {
            return Err(errors::ErrorKind::InvalidInput(format!(
                "address {} has prefix {}, expected {}",
                encoded, hrp, self.hrp
            ))
            .into());
        }

        let bytes = Vec::<u8>::from_base32(&data).map_err(errors::ErrorKind::from)?;
        Ok(Address::from(bytes))
    }

    fn address_len(&self) -> usize {
        ADDRESS_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(self_shard_id: u32, number_of_shards: u32) -> MaskShardCoordinator {
        MaskShardCoordinator::new(&ShardConfig {
            self_shard_id,
            number_of_shards,
            is_import_mode: false,
        })
        .unwrap()
    }

    fn address_with_last_byte(byte: u8) -> Address {
        let mut bytes = vec![0x11; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 1] = byte;
        Address::from(bytes)
    }

    #[test]
    fn test_compute_id_uses_high_mask_first() {
        let coordinator = coordinator(0, 3);

        assert_eq!(coordinator.compute_id(&address_with_last_byte(0)), 0);
        assert_eq!(coordinator.compute_id(&address_with_last_byte(1)), 1);
        assert_eq!(coordinator.compute_id(&address_with_last_byte(2)), 2);
        // 3 & mask_high == 3, past the last shard, so the low mask applies
        assert_eq!(coordinator.compute_id(&address_with_last_byte(3)), 1);
        assert_eq!(coordinator.compute_id(&address_with_last_byte(0xFF)), 1);
    }

    #[test]
    fn test_single_shard_maps_everything_to_zero() {
        let coordinator = coordinator(0, 1);
        for byte in [0u8, 1, 42, 0xFF] {
            assert_eq!(coordinator.compute_id(&address_with_last_byte(byte)), 0);
        }
    }

    #[test]
    fn test_rejects_out_of_range_self_shard() {
        let result = MaskShardCoordinator::new(&ShardConfig {
            self_shard_id: 5,
            number_of_shards: 3,
            is_import_mode: false,
        });
        assert!(result.is_err());

        let metachain = MaskShardCoordinator::new(&ShardConfig {
            self_shard_id: METACHAIN_SHARD_ID,
            number_of_shards: 3,
            is_import_mode: false,
        });
        assert!(metachain.is_ok());
    }

    #[test]
    fn test_bech32_round_trip() {
        let codec = Bech32AddressCodec::new("erd").unwrap();
        let address = address_with_last_byte(7);

        let encoded = codec.encode(&address).unwrap();
        assert!(encoded.starts_with("erd1"));

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, address);
    }

    #[test]
    fn test_bech32_rejects_foreign_prefix() {
        let codec = Bech32AddressCodec::new("erd").unwrap();
        let other = Bech32AddressCodec::new("xyz").unwrap();

        let encoded = other.encode(&address_with_last_byte(1)).unwrap();
        assert!(codec.decode(&encoded).is_err());
    }
}
