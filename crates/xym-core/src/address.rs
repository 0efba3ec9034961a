//! Symbol account addresses.
//!
//! An address is 24 bytes: the network byte, RIPEMD160(SHA3-256(public key))
//! and a 3-byte SHA3-256 checksum over the first 21 bytes. Its text form is
//! base32 with the single trailing pad character stripped (39 characters).

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};

use crate::error::CoreError;
use crate::types::{deserialize_fixed, serialize_fixed, PublicKey};

/// Network identifier for Symbol mainnet (addresses start with `N`).
pub const MAINNET: u8 = 0x68;

/// Network identifier for Symbol testnet (addresses start with `T`).
pub const TESTNET: u8 = 0x98;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 24]);

impl Address {
    pub const LEN: usize = 24;

    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }

    pub fn network(&self) -> u8 {
        self.0[0]
    }

    /// Derive the address for `public_key` on `network`.
    pub fn from_public_key(public_key: &PublicKey, network: u8) -> Self {
        let key_hash = Sha3_256::digest(public_key.as_bytes());
        let ripemd = Ripemd160::digest(key_hash);

        let mut out = [0u8; 24];
        out[0] = network;
        out[1..21].copy_from_slice(&ripemd);
        let checksum = Sha3_256::digest(&out[..21]);
        out[21..].copy_from_slice(&checksum[..3]);
        Self(out)
    }

    /// `true` when the trailing checksum matches the first 21 bytes.
    /// Unresolved (alias) addresses carried in statements fail this check.
    pub fn has_valid_checksum(&self) -> bool {
        let checksum = Sha3_256::digest(&self.0[..21]);
        checksum[..3] == self.0[21..]
    }
}

/// Encode raw address bytes as unpadded base32.
pub fn encode_address(address: &[u8; 24]) -> String {
    BASE32_NOPAD.encode(address)
}

/// Derive the text address for `public_key` on `network`.
pub fn public_key_to_address(public_key: &PublicKey, network: u8) -> String {
    Address::from_public_key(public_key, network).to_string()
}

fn parse_address(s: &str) -> Option<[u8; 24]> {
    let decoded = BASE32_NOPAD.decode(s.trim_end_matches('=').as_bytes()).ok()?;
    decoded.try_into().ok()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidAddress(s.to_string()))
    }
}

impl From<[u8; 24]> for Address {
    fn from(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_fixed(&self.0, || self.to_string(), serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_fixed(deserializer, parse_address, "a base32 address or 24 raw bytes").map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hex_key: &str) -> PublicKey {
        hex_key.parse().expect("valid public key hex")
    }

    #[test]
    fn nemesis_signer_derives_known_address() {
        let signer = key("be0b4cf546b7b4f4bbfcff9f574fda527c07a53d3fc76f8bb7db746f8e8e0a9f");
        assert_eq!(
            public_key_to_address(&signer, MAINNET),
            "NASYMBOLLK6FSL7GSEMQEAWN7VW55ZSZU25TBOA"
        );
    }

    #[test]
    fn derivation_is_deterministic_and_distinct() {
        let a = key("2880a86a59630954d664a180038983fdbdf66e3937633439880624ed99a050a5");
        let b = key("be0b4cf546b7b4f4bbfcff9f574fda527c07a53d3fc76f8bb7db746f8e8e0a9f");

        let first = public_key_to_address(&a, MAINNET);
        assert_eq!(first, public_key_to_address(&a, MAINNET));
        assert_eq!(first, "NANMZ4NJVOYNIQWTJ646G4NBWBALZAOGUJ3J3EQ");
        assert_eq!(first.len(), 39);
        assert_ne!(first, public_key_to_address(&b, MAINNET));
    }

    #[test]
    fn derived_address_has_valid_checksum() {
        let a = key("2880a86a59630954d664a180038983fdbdf66e3937633439880624ed99a050a5");
        let address = Address::from_public_key(&a, MAINNET);
        assert!(address.has_valid_checksum());
        assert_eq!(address.network(), MAINNET);

        let mut tampered = address;
        tampered.0[23] ^= 0xFF;
        assert!(!tampered.has_valid_checksum());
    }

    #[test]
    fn encodes_raw_bytes_without_pad() {
        let raw: [u8; 24] = [
            0x68, 0x1d, 0x37, 0x77, 0xa2, 0x58, 0xc3, 0x68, 0x72, 0x86, 0xe7, 0xe2, 0xb1, 0x15,
            0x93, 0x50, 0xf2, 0x7a, 0x5f, 0x4b, 0x31, 0x73, 0x54, 0xfc,
        ];
        assert_eq!(encode_address(&raw), "NAOTO55CLDBWQ4UG47RLCFMTKDZHUX2LGFZVJ7A");

        let parsed: Address = "NAOTO55CLDBWQ4UG47RLCFMTKDZHUX2LGFZVJ7A"
            .parse()
            .expect("parse address");
        assert_eq!(parsed.0, raw);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!("NAOTO55".parse::<Address>().is_err());
        assert!("not base32!".parse::<Address>().is_err());
    }

    #[test]
    fn serde_uses_text_for_json() {
        let address: Address = "NASYMBOLLK6FSL7GSEMQEAWN7VW55ZSZU25TBOA"
            .parse()
            .expect("parse address");
        let json = serde_json::to_string(&address).expect("serialize");
        assert_eq!(json, "\"NASYMBOLLK6FSL7GSEMQEAWN7VW55ZSZU25TBOA\"");
        let raw = bincode::serialize(&address).expect("bincode");
        let back: Address = bincode::deserialize(&raw).expect("bincode back");
        assert_eq!(back, address);
    }
}
