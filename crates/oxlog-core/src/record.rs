use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record in the log.
///
/// The payload is opaque to the storage layer; the offset is assigned by
/// the log during append and round-tripped on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Offset within the log. Zero until the record is appended.
    pub offset: u64,

    /// Opaque payload.
    #[serde(with = "bytes_serde")]
    pub value: Bytes,
}

impl Record {
    pub fn new(value: Bytes) -> Self {
        Self { offset: 0, value }
    }

    /// Encode for storage. The store file only ever sees this blob.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decode a blob read back from the store.
    pub fn from_bytes(data: &[u8]) -> crate::Result<Self> {
        Ok(postcard::from_bytes(data)?)
    }
}

mod bytes_serde {
    use bytes::Bytes;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(val: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_bytes::serialize(&val[..], serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        Ok(Bytes::from(v))
    }
}
