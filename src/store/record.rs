//! Route record type and its on-disk encoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A persisted path → target mapping with its hit counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Lookup key, stored without a leading `/`.
    pub key: String,

    /// Absolute redirect target.
    pub target: String,

    /// Number of redirects served for this key. Advisory only.
    #[serde(default)]
    pub hit_count: u64,
}

/// Errors from encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode route record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode route record: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl RouteRecord {
    /// Create a record with a zero hit count.
    pub fn new(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
            hit_count: 0,
        }
    }

    /// Encode as MessagePack with named fields.
    ///
    /// Field names travel with the value, so adding or reordering fields
    /// does not invalidate records already on disk.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode bytes produced by [`RouteRecord::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let record = RouteRecord {
            key: "docs".into(),
            target: "https://example.com/docs?page=1".into(),
            hit_count: 42,
        };

        let bytes = record.encode().unwrap();
        assert_eq!(RouteRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        let bytes = RouteRecord::new("a", "https://example.com/a").encode().unwrap();

        for cut in [0, 1, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                RouteRecord::decode(&bytes[..cut]).is_err(),
                "decode accepted {} of {} bytes",
                cut,
                bytes.len()
            );
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(RouteRecord::decode(b"not a record").is_err());
        assert!(RouteRecord::decode(&[0xc1, 0xff, 0x00]).is_err());
    }

    #[test]
    fn test_missing_hit_count_defaults_to_zero() {
        #[derive(Serialize)]
        struct Legacy<'a> {
            key: &'a str,
            target: &'a str,
        }

        let bytes = rmp_serde::to_vec_named(&Legacy {
            key: "a",
            target: "https://example.com/a",
        })
        .unwrap();

        let record = RouteRecord::decode(&bytes).unwrap();
        assert_eq!(record.hit_count, 0);
        assert_eq!(record.target, "https://example.com/a");
    }
}
