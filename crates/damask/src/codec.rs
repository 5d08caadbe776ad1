//! Canonical block encoding and content identifiers
//!
//! Every persistent payload (tree node, table header, database root) is
//! serialized to canonical DAG-CBOR and addressed by
//! `CIDv1(dag-cbor, sha2-256(bytes))`. The same logical payload always
//! produces the same bytes, so equal states converge on equal CIDs.
//!
//! Wire structs in this crate declare their fields in DAG-CBOR canonical
//! map order (shorter names first, then bytewise) and serialize `Option`
//! fields as explicit `null`, never skipped: skipping would change the
//! bytes and therefore the CID.

use crate::error::{CodecError, Result};
use bytes::Bytes;
use cid::Cid;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

/// SHA2-256 multihash code
pub(crate) const SHA2_256: u64 = 0x12;

/// One unit of persistence: canonical bytes plus their content identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Content identifier (hash of `bytes`)
    pub cid: Cid,
    /// Canonical DAG-CBOR payload
    pub bytes: Bytes,
}

/// Compute the CID for already-encoded DAG-CBOR bytes.
pub fn compute_cid(data: &[u8]) -> Result<Cid> {
    let mut sha = Sha256::new();
    sha.update(data);
    let hash = sha.finalize();

    let mh = multihash::Multihash::<64>::wrap(SHA2_256, hash.as_slice())
        .map_err(|e| CodecError::Cid(e.to_string()))?;

    Ok(Cid::new_v1(crate::DAG_CBOR_CID_CODEC, mh))
}

/// Serialize a payload to canonical DAG-CBOR and address it.
pub(crate) fn encode_block<T: Serialize>(payload: &T) -> Result<Block> {
    let bytes =
        serde_ipld_dagcbor::to_vec(payload).map_err(|e| CodecError::Encode(Box::new(e)))?;
    let cid = compute_cid(&bytes)?;

    Ok(Block {
        cid,
        bytes: Bytes::from(bytes),
    })
}

/// Decode a block payload.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_ipld_dagcbor::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))?)
}

/// Canonical encoding of a bare key, used by the chunker.
pub(crate) fn key_bytes<K: Serialize>(key: &K) -> Result<Vec<u8>> {
    serde_ipld_dagcbor::to_vec(key).map_err(|e| CodecError::Encode(Box::new(e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn same_payload_same_cid() {
        let a = encode_block(&vec![Value::Int(1), Value::Str("x".into())]).unwrap();
        let b = encode_block(&vec![Value::Int(1), Value::Str("x".into())]).unwrap();

        assert_eq!(a.cid, b.cid);
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn different_payload_different_cid() {
        let a = encode_block(&vec![Value::Int(1)]).unwrap();
        let b = encode_block(&vec![Value::Int(2)]).unwrap();

        assert_ne!(a.cid, b.cid);
    }

    #[test]
    fn cid_matches_raw_hash() {
        let block = encode_block(&Value::Int(42)).unwrap();
        assert_eq!(block.cid, compute_cid(&block.bytes).unwrap());
    }

    #[test]
    fn roundtrip_row() {
        let row = vec![Value::Null, Value::Int(-7), Value::Str("hello".into())];
        let block = encode_block(&row).unwrap();
        let decoded: Vec<Value> = decode(&block.bytes).unwrap();

        assert_eq!(decoded, row);
    }
}
