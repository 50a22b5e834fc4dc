use std::str::FromStr;

use alloy_primitives::Address;

/// EIP-55 checksum of an address. Unparsable input is returned as is.
pub fn checksum(address: &str) -> String {
    match Address::from_str(address) {
        Ok(addr) => addr.to_checksum(None),
        Err(_) => {
            tracing::error!("Invalid address: {}", address);
            address.to_string()
        }
    }
}

/// A JSON argument as a plain string: strings lose their quotes, anything else
/// is printed as JSON.
pub fn arg_to_string(arg: &serde_json::Value) -> String {
    match arg.as_str() {
        Some(s) => s.to_string(),
        None => arg.to_string(),
    }
}
