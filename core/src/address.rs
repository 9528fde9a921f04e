use ethers::types::Address;
use ethers::utils::to_checksum;

/// Length of a `0x`-prefixed, hex-encoded 20-byte address.
pub const ADDRESS_LENGTH: usize = 42;

/// Parse a `0x`-prefixed hex address.
///
/// All-lowercase and all-uppercase spellings are accepted as-is; a
/// mixed-case spelling must carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Option<Address> {
    let hex_part = input.strip_prefix("0x")?;
    if hex_part.len() != ADDRESS_LENGTH - 2 {
        return None;
    }
    let bytes = hex::decode(hex_part).ok()?;
    let address = Address::from_slice(&bytes);

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address, None) != input {
        return None;
    }
    Some(address)
}

pub fn is_wallet_valid(input: &str) -> bool {
    parse_address(input).is_some()
}
