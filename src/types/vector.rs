use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Helper class to serialize/deserialize `Vec<u8>` to hex string.
/// Payloads and log topics are raw bytes on the wire but hex strings in the
/// JSON envelopes this crate consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexVecU8(pub Vec<u8>);

impl From<Vec<u8>> for HexVecU8 {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for HexVecU8 {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl From<HexVecU8> for Vec<u8> {
    fn from(v: HexVecU8) -> Vec<u8> {
        v.0
    }
}

impl HexVecU8 {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for HexVecU8 {
    fn serialize<S>(&self, serializer: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexVecU8 {
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
