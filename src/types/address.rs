use derive_more::{AsRef, Deref, From, Into};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Smart-contract addresses are prefixed with a fixed run of zero bytes,
// followed by the 2-byte VM type.
const SC_LEADING_ZERO_BYTES: usize = 8;

/// Raw account address bytes, hex-encoded inside JSON envelopes. The
/// human-readable (bech32) form only exists in the emitted documents and is
/// produced by the address codec collaborator.
#[derive(Eq, Ord, Hash, Clone, PartialEq, PartialOrd, Default, From, Into, AsRef, Deref)]
pub struct Address(pub(crate) Vec<u8>);

impl Address {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The all-zero address is the deploy target, not a real account.
    pub fn is_empty_address(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| *b == 0)
    }

    pub fn is_smart_contract(&self) -> bool {
        if self.0.len() <= SC_LEADING_ZERO_BYTES || self.is_empty_address() {
            return false;
        }

        self.0[..SC_LEADING_ZERO_BYTES].iter().all(|b| *b == 0)
    }
}

impl From<&[u8]> for Address {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", hex::encode(&self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Ok(Self(hex::decode(s).map_err(|err| {
            serde::de::Error::custom(err.to_string())
        })?))
    }
}
