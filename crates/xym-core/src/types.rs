//! Fixed-width byte types shared by the block, transaction and receipt
//! decoders.
//!
//! Every type here serializes as a lowercase hex string for human-readable
//! formats (JSON) and as raw bytes for binary formats (the bincode record
//! streams and snapshots), so the same structs feed both the reporting
//! output and the compact on-disk formats.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ==============================================================================
// Serde Helpers
// ==============================================================================

pub(crate) fn serialize_fixed<S: Serializer>(
    bytes: &[u8],
    text: impl FnOnce() -> String,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&text())
    } else {
        serializer.serialize_bytes(bytes)
    }
}

pub(crate) fn deserialize_fixed<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
    parse_str: fn(&str) -> Option<[u8; N]>,
    expecting: &'static str,
) -> Result<[u8; N], D::Error> {
    let visitor = FixedBytesVisitor {
        parse_str,
        expecting,
    };
    if deserializer.is_human_readable() {
        deserializer.deserialize_str(visitor)
    } else {
        deserializer.deserialize_bytes(visitor)
    }
}

struct FixedBytesVisitor<const N: usize> {
    parse_str: fn(&str) -> Option<[u8; N]>,
    expecting: &'static str,
}

impl<'de, const N: usize> Visitor<'de> for FixedBytesVisitor<N> {
    type Value = [u8; N];

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expecting)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        (self.parse_str)(v).ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        v.try_into().map_err(|_| E::invalid_length(v.len(), &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = [0u8; N];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = seq
                .next_element()?
                .ok_or_else(|| <A::Error as de::Error>::invalid_length(i, &self))?;
        }
        Ok(out)
    }
}

fn parse_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}

/// `#[serde(with = "hex_bytes")]` for variable-length byte fields (messages,
/// metadata values, proofs): hex text for JSON, raw bytes for bincode.
pub(crate) mod hex_bytes {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize_fixed(bytes, || hex::encode(bytes), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("hex text or raw bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Vec<u8>, E> {
                hex::decode(v).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
                Ok(v)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(BytesVisitor)
        } else {
            deserializer.deserialize_byte_buf(BytesVisitor)
        }
    }
}

// ==============================================================================
// Byte Array Newtypes
// ==============================================================================

macro_rules! byte_array {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut out = [0u8; $len];
                hex::decode_to_slice(s, &mut out)?;
                Ok(Self(out))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serialize_fixed(&self.0, || self.to_hex(), serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserialize_fixed(
                    deserializer,
                    parse_hex::<$len>,
                    concat!("a ", stringify!($len), "-byte value as hex or raw bytes"),
                )
                .map(Self)
            }
        }
    };
}

byte_array!(
    /// A 32-byte hash (block, transactions, receipts, state and merkle roots).
    Hash256,
    32
);

byte_array!(
    /// An ed25519 public key.
    PublicKey,
    32
);

byte_array!(
    /// An ed25519 signature.
    Signature,
    64
);

byte_array!(
    /// VRF proof carried in the block header (gamma, verification hash, scalar).
    GenerationHashProof,
    80
);

// ==============================================================================
// Mosaics
// ==============================================================================

/// Mosaic id and amount pair, as carried by transfers and locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mosaic {
    pub mosaic_id: u64,
    pub amount: u64,
}

/// The native currency's mosaic id aliases (mainnet id and the
/// `symbol.xym` namespace alias).
pub const XYM_MOSAIC_IDS: [u64; 2] = [0x6BED_913F_A202_23F8, 0xE74B_99BA_41F4_AFEE];
