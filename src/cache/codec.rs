use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::{CODEC_TAG_LZ4, CODEC_TAG_PLAIN, MAX_DECOMPRESSED_SIZE};
use crate::utils::CacheError;

/// bincode settings shared by both directions. Trailing bytes are rejected
/// so reading a payload as the wrong type fails instead of decoding a prefix.
fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serialize a value into a tagged payload, optionally lz4-compressed
pub fn encode<T>(value: &T, compress: bool) -> Result<Vec<u8>, CacheError>
where
    T: Serialize + ?Sized,
{
    let serialized = bincode_options()
        .serialize(value)
        .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;

    if !compress {
        let mut payload = Vec::with_capacity(serialized.len() + 1);
        payload.push(CODEC_TAG_PLAIN);
        payload.extend_from_slice(&serialized);
        return Ok(payload);
    }

    let compressed = lz4::block::compress(&serialized, None, true)
        .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;
    let mut payload = Vec::with_capacity(compressed.len() + 1);
    payload.push(CODEC_TAG_LZ4);
    payload.extend_from_slice(&compressed);
    Ok(payload)
}

/// Decode a payload written by [`encode`], whatever its compression
pub fn decode<T>(payload: &[u8]) -> Result<T, CacheError>
where
    T: DeserializeOwned,
{
    let (tag, body) = payload
        .split_first()
        .ok_or_else(|| CacheError::DeserializationFailed("empty payload".to_string()))?;

    match *tag {
        CODEC_TAG_PLAIN => deserialize(body),
        CODEC_TAG_LZ4 => {
            // lz4 prepends the decompressed size as a little-endian u32
            let declared = body
                .get(..4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
                .ok_or_else(|| CacheError::DeserializationFailed("truncated lz4 header".to_string()))?;
            if declared > MAX_DECOMPRESSED_SIZE {
                return Err(CacheError::DeserializationFailed(format!(
                    "declared size {declared} exceeds limit"
                )));
            }
            let decompressed = lz4::block::decompress(body, None)
                .map_err(|e| CacheError::DeserializationFailed(e.to_string()))?;
            deserialize(&decompressed)
        }
        other => Err(CacheError::DeserializationFailed(format!(
            "unknown payload tag {other}"
        ))),
    }
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    bincode_options()
        .deserialize(bytes)
        .map_err(|e| CacheError::DeserializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
        visits: u64,
    }

    fn sample() -> Profile {
        Profile {
            name: "ada".to_string(),
            tags: vec!["admin".to_string(); 64],
            visits: 7,
        }
    }

    #[test]
    fn test_plain_payload() {
        let payload = encode(&sample(), false).unwrap();
        assert_eq!(payload[0], CODEC_TAG_PLAIN);
        assert_eq!(decode::<Profile>(&payload).unwrap(), sample());
    }

    #[test]
    fn test_compressed_payload() {
        let plain = encode(&sample(), false).unwrap();
        let packed = encode(&sample(), true).unwrap();
        assert_eq!(packed[0], CODEC_TAG_LZ4);
        assert!(packed.len() < plain.len());
        assert_eq!(decode::<Profile>(&packed).unwrap(), sample());
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let payload = encode("hello", false).unwrap();
        assert!(matches!(
            decode::<u8>(&payload),
            Err(CacheError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode::<u64>(&payload),
            Err(CacheError::DeserializationFailed(_))
        ));
        assert_eq!(decode::<String>(&payload).unwrap(), "hello");

        let packed = encode(&sample(), true).unwrap();
        assert!(decode::<String>(&packed).is_err());
    }

    #[test]
    fn test_bad_payloads() {
        assert!(matches!(
            decode::<String>(&[]),
            Err(CacheError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode::<String>(&[9, 1, 2, 3]),
            Err(CacheError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode::<String>(&[CODEC_TAG_LZ4, 1]),
            Err(CacheError::DeserializationFailed(_))
        ));
        // Length prefix promises more bytes than exist
        assert!(matches!(
            decode::<String>(&[CODEC_TAG_PLAIN, 200, 0, 0, 0, 0, 0, 0, 0, b'x']),
            Err(CacheError::DeserializationFailed(_))
        ));
    }
}
