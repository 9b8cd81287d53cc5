// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware address type.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Stable hardware address of a device, the key of the registry.
///
/// Always stored as 12 lowercase hexadecimal digits without separators.
/// Parsing accepts `:` and `-` separators and upper case digits.
///
/// # Examples
///
/// ```
/// use climate_hub::types::MacAddress;
///
/// let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
/// assert_eq!(mac.as_str(), "aabbccddeeff");
///
/// assert!("not-a-mac".parse::<MacAddress>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Number of hexadecimal digits in a hardware address.
    pub const LEN: usize = 12;

    /// Returns the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if normalized.len() != Self::LEN || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValueError::InvalidMac(s.to_string()));
        }

        Ok(Self(normalized))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_lowercase() {
        let mac: MacAddress = "aabbccddeeff".parse().unwrap();
        assert_eq!(mac.to_string(), "aabbccddeeff");
    }

    #[test]
    fn strips_separators_and_lowercases() {
        let a: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let b: MacAddress = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!("aabbccddee".parse::<MacAddress>().is_err());
        assert!("unknownmac".parse::<MacAddress>().is_err());
        assert!("aabbccddeegg".parse::<MacAddress>().is_err());
    }

    #[test]
    fn serde_uses_plain_string() {
        let mac: MacAddress = "aabbccddeeff".parse().unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"aabbccddeeff\"");

        let back: MacAddress = serde_json::from_str("\"AA:BB:CC:DD:EE:FF\"").unwrap();
        assert_eq!(back, mac);

        assert!(serde_json::from_str::<MacAddress>("\"xyz\"").is_err());
    }
}
