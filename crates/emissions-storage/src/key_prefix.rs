//! Collection prefixes derived with Blake3.
//!
//! Every collection key starts with a fixed 10-byte prefix so that RocksDB
//! prefix extraction and bloom filters apply uniformly.

/// Fixed prefix length for all collection keys
pub const PREFIX_LEN: usize = 10;

/// First `PREFIX_LEN` bytes of `blake3(name)`.
pub fn hash_prefix(name: &[u8]) -> [u8; PREFIX_LEN] {
    let hash = blake3::hash(name);
    let mut result = [0u8; PREFIX_LEN];
    result.copy_from_slice(&hash.as_bytes()[..PREFIX_LEN]);
    result
}
