//! Order-preserving key encoding.
//!
//! Encoded keys sort byte-wise in the same order as the values they encode,
//! and the encoding of a tuple's leading components is a byte prefix of the
//! encoding of the whole tuple. Together these let a collection iterate, for
//! example, every `(topic, delegator, reputer)` entry of one
//! `(topic, delegator)` pair with a single prefix scan.
//!
//! * `u8`, `u64`: big-endian
//! * `i64`: big-endian with the sign bit flipped
//! * `String`: UTF-8 bytes followed by a NUL terminator (NUL is rejected)
//! * tuples: concatenation of their components

use crate::backend::{Result, StorageError};

pub trait KeyCodec: Sized {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Decodes one value from the front of `bytes`, returning it and the
    /// number of bytes consumed.
    fn decode_key(bytes: &[u8]) -> Result<(Self, usize)>;
}

fn truncated(what: &str) -> StorageError {
    StorageError::InvalidKey(format!("truncated {} key component", what))
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    let slice = bytes.get(..N).ok_or_else(|| truncated(what))?;
    let mut array = [0u8; N];
    array.copy_from_slice(slice);
    Ok(array)
}

impl KeyCodec for u8 {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(*self);
        Ok(())
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, usize)> {
        let [b] = fixed::<1>(bytes, "u8")?;
        Ok((b, 1))
    }
}

impl KeyCodec for u64 {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, usize)> {
        Ok((u64::from_be_bytes(fixed::<8>(bytes, "u64")?), 8))
    }
}

const SIGN_BIT: u64 = 1 << 63;

impl KeyCodec for i64 {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&((*self as u64) ^ SIGN_BIT).to_be_bytes());
        Ok(())
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, usize)> {
        let raw = u64::from_be_bytes(fixed::<8>(bytes, "i64")?);
        Ok(((raw ^ SIGN_BIT) as i64, 8))
    }
}

impl KeyCodec for String {
    fn encode_key(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.as_bytes().contains(&0) {
            return Err(StorageError::InvalidKey(format!(
                "string key component contains NUL: {:?}",
                self
            )));
        }
        out.extend_from_slice(self.as_bytes());
        out.push(0);
        Ok(())
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, usize)> {
        let end = bytes
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| truncated("string"))?;
        let s = std::str::from_utf8(&bytes[..end])
            .map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        Ok((s.to_string(), end + 1))
    }
}

macro_rules! tuple_key_codec {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: KeyCodec),+> KeyCodec for ($($ty,)+) {
            fn encode_key(&self, out: &mut Vec<u8>) -> Result<()> {
                let ($($var,)+) = self;
                $($var.encode_key(out)?;)+
                Ok(())
            }

            fn decode_key(bytes: &[u8]) -> Result<(Self, usize)> {
                let mut offset = 0;
                $(
                    let ($var, used) = <$ty as KeyCodec>::decode_key(&bytes[offset..])?;
                    offset += used;
                )+
                Ok((($($var,)+), offset))
            }
        }
    };
}

tuple_key_codec!(A a, B b);
tuple_key_codec!(A a, B b, C c);
tuple_key_codec!(A a, B b, C c, D d);

/// Encodes `key` into a fresh buffer.
pub fn encode<K: KeyCodec>(key: &K) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    key.encode_key(&mut out)?;
    Ok(out)
}

/// Decodes `bytes` as exactly one `K`; trailing bytes are an error.
pub fn decode<K: KeyCodec>(bytes: &[u8]) -> Result<K> {
    let (key, used) = K::decode_key(bytes)?;
    if used != bytes.len() {
        return Err(StorageError::InvalidKey(format!(
            "{} trailing bytes after key",
            bytes.len() - used
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_order_preserved() {
        let values = [i64::MIN, -5, -1, 0, 1, 42, i64::MAX];
        let encoded: Vec<Vec<u8>> = values.iter().map(|v| encode(v).unwrap()).collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);
        for (v, bytes) in values.iter().zip(&encoded) {
            assert_eq!(decode::<i64>(bytes).unwrap(), *v);
        }
    }

    #[test]
    fn test_tuple_prefix_property() {
        let full = encode(&(7u64, "alice".to_string(), "bob".to_string())).unwrap();
        let prefix = encode(&(7u64, "alice".to_string())).unwrap();
        let other = encode(&(7u64, "alicex".to_string())).unwrap();

        assert!(full.starts_with(&prefix));
        assert!(!full.starts_with(&other));
    }

    #[test]
    fn test_string_ordering_matches_lexicographic() {
        let a = encode(&(1u64, "ab".to_string(), "z".to_string())).unwrap();
        let b = encode(&(1u64, "abc".to_string(), "a".to_string())).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_nul_in_string_rejected() {
        assert!(encode(&"a\0b".to_string()).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode::<u64>(&[1, 2, 3]).is_err());
        assert!(decode::<String>(b"no-terminator").is_err());
        assert!(decode::<u64>(&[0; 9]).is_err());
    }

    #[test]
    fn test_four_component_key() {
        let key = (-3i64, 9u64, "w".to_string(), 2u8);
        let bytes = encode(&key).unwrap();
        assert_eq!(decode::<(i64, u64, String, u8)>(&bytes).unwrap(), key);
    }
}
