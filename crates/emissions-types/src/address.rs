use crate::error::{Result, ValidationError};
use bech32::{Bech32, Hrp};

pub const ACCOUNT_HRP: &str = "emx";
pub const ADDRESS_LEN: usize = 20;

fn invalid(address: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidAddress {
        address: address.to_string(),
        reason: reason.into(),
    }
}

pub fn encode_address(bytes: &[u8; ADDRESS_LEN]) -> Result<String> {
    let hrp = Hrp::parse(ACCOUNT_HRP).map_err(|e| invalid(ACCOUNT_HRP, e.to_string()))?;
    bech32::encode::<Bech32>(hrp, bytes).map_err(|e| invalid("<bytes>", e.to_string()))
}

pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_LEN]> {
    let (hrp, data) = bech32::decode(address).map_err(|e| invalid(address, e.to_string()))?;

    if hrp.as_str() != ACCOUNT_HRP {
        return Err(invalid(
            address,
            format!("expected prefix '{}', got '{}'", ACCOUNT_HRP, hrp.as_str()),
        ));
    }

    if data.len() != ADDRESS_LEN {
        return Err(invalid(
            address,
            format!("expected {} bytes, got {}", ADDRESS_LEN, data.len()),
        ));
    }

    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&data);
    Ok(bytes)
}

pub fn validate_address(address: &str) -> Result<()> {
    decode_address(address).map(|_| ())
}

/// Deterministic address derived from an arbitrary seed (module accounts, fixtures).
pub fn address_from_seed(seed: &[u8]) -> Result<String> {
    let digest = blake3::hash(seed);
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN]);
    encode_address(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let bytes = [0x12; ADDRESS_LEN];
        let encoded = encode_address(&bytes).unwrap();

        assert!(encoded.starts_with("emx1"));
        assert_eq!(decode_address(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_validate_address() {
        let valid = encode_address(&[0x55; ADDRESS_LEN]).unwrap();

        assert!(validate_address(&valid).is_ok());
        assert!(validate_address("invalid_address").is_err());
        assert!(validate_address("").is_err());
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        let hrp = Hrp::parse("cosmos").unwrap();
        let foreign = bech32::encode::<Bech32>(hrp, &[0x01; ADDRESS_LEN]).unwrap();

        let err = decode_address(&foreign).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAddress { .. }));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let hrp = Hrp::parse(ACCOUNT_HRP).unwrap();
        let short = bech32::encode::<Bech32>(hrp, &[0x01; 8]).unwrap();
        assert!(validate_address(&short).is_err());
    }

    #[test]
    fn test_seeded_addresses_are_stable() {
        let a = address_from_seed(b"worker-1").unwrap();
        let b = address_from_seed(b"worker-1").unwrap();
        let c = address_from_seed(b"worker-2").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(validate_address(&a).is_ok());
    }
}
