//! CBOR encoding for values exchanged through collectives.
//!
//! The substrate moves raw bytes; typed values (election reports, file
//! inventories, digests) are encoded with CBOR on the way in and decoded
//! on the way out.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CommError, Result};

/// Encode a value as CBOR.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CommError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| CommError::Decoding(e.to_string()))
}

/// Decode every entry of a gathered vector.
pub fn decode_all<T: DeserializeOwned>(entries: &[Vec<u8>]) -> Result<Vec<T>> {
    entries.iter().map(|bytes| decode(bytes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_core::{ElectionReport, FileDigest};

    #[test]
    fn test_report_roundtrip() {
        let reports = vec![
            ElectionReport::Presence(true),
            ElectionReport::Size(None),
            ElectionReport::Size(Some(0)),
            ElectionReport::Match(false),
        ];
        let encoded: Vec<Vec<u8>> = reports.iter().map(|r| encode(r).unwrap()).collect();
        let decoded: Vec<ElectionReport> = decode_all(&encoded).unwrap();
        assert_eq!(decoded, reports);
    }

    #[test]
    fn test_absent_digest_stays_absent() {
        let digest: Option<FileDigest> = None;
        let decoded: Option<FileDigest> = decode(&encode(&digest).unwrap()).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result: Result<ElectionReport> = decode(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CommError::Decoding(_))));
    }
}
