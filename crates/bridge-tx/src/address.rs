//! Address helpers: format checks per chain family and metadata chunking

use bridge_core::ChainType;

/// Metadata text fields are limited in width; addresses are split at this length
pub const ADDRESS_CHUNK_LEN: usize = 40;

/// Human-readable prefixes accepted for UTXO chain addresses
const CARDANO_PREFIXES: [&str; 4] = ["addr1", "addr_test1", "vector1", "vector_test1"];

/// bech32 data-part alphabet
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Split `value` into chunks of at most `chunk_len` characters
pub fn split_string(value: &str, chunk_len: usize) -> Vec<String> {
    if chunk_len == 0 {
        return vec![value.to_string()];
    }

    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(chunk_len)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Split an address into metadata-width chunks
pub fn address_chunks(address: &str) -> Vec<String> {
    split_string(address, ADDRESS_CHUNK_LEN)
}

/// Basic format validation for an address on a chain of type `chain_type`.
///
/// This checks prefix, length and alphabet; checksums are left to the ledger.
pub fn validate_address(chain_type: ChainType, address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("Address cannot be empty".to_string());
    }

    match chain_type {
        ChainType::Cardano => validate_cardano_address(address),
        ChainType::Evm => validate_evm_address(address),
    }
}

fn validate_cardano_address(address: &str) -> Result<(), String> {
    let prefix = CARDANO_PREFIXES
        .iter()
        .find(|p| address.starts_with(*p))
        .ok_or_else(|| {
            format!(
                "Address must start with one of: {}",
                CARDANO_PREFIXES.join(", ")
            )
        })?;

    // Enterprise addresses are the shortest valid form
    if address.len() < 50 {
        return Err("Address is too short".to_string());
    }
    if address.len() > 120 {
        return Err("Address is too long".to_string());
    }

    let data = &address[prefix.len()..];
    if !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
        return Err("Address contains non-bech32 characters".to_string());
    }

    Ok(())
}

fn validate_evm_address(address: &str) -> Result<(), String> {
    if !address.starts_with("0x") {
        return Err("Address must start with '0x'".to_string());
    }
    if address.len() != 42 {
        return Err("Address must be 42 characters (0x + 40 hex chars)".to_string());
    }
    if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("Address contains non-hex characters".to_string());
    }
    Ok(())
}
