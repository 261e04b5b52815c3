//! Domain types for DAO migrations.
//!
//! Hex-backed values (`Address`, `Bytes32`, `Bytes`) always serialize as
//! `0x`-prefixed lowercase strings; parsing accepts either case.

use std::fmt;
use std::str::FromStr;

use ethers::types::{H160, H256, U256};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::TypeParseError;

// ---------------------------------------------------------------------------
// String newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(
    /// Logical contract name, e.g. `GenesisProtocol`. Also the artifact file stem.
    ContractName
);
string_newtype!(
    /// Key identifying a target network in configuration and state files.
    NetworkKey
);
string_newtype!(
    /// Version identifier of a contract package, e.g. `0.0.1-rc.32`.
    PackageVersion
);

// ---------------------------------------------------------------------------
// Hex values
// ---------------------------------------------------------------------------

/// Arbitrary-length byte string (bytecode, calldata, log data).
pub use ethers::types::Bytes;

fn decode_prefixed(s: &str) -> Result<Vec<u8>, TypeParseError> {
    let body = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| TypeParseError::MissingPrefix(s.to_owned()))?;
    hex::decode(body).map_err(|e| TypeParseError::InvalidHex {
        value: s.to_owned(),
        reason: e.to_string(),
    })
}

/// Newtype over an `ethers` fixed hash that displays in full (`{:#x}`)
/// rather than the abbreviated `0x1234…abcd` of the inner type.
macro_rules! fixed_hex {
    ($(#[$meta:meta])* $name:ident, $inner:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub $inner);

        impl $name {
            pub const LEN: usize = $len;
            pub const ZERO: Self = Self($inner([0u8; $len]));

            pub fn repeat_byte(byte: u8) -> Self {
                Self($inner::repeat_byte(byte))
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeParseError> {
                if bytes.len() != $len {
                    return Err(TypeParseError::WrongLength {
                        expected: $len,
                        found: bytes.len(),
                    });
                }
                Ok(Self($inner::from_slice(bytes)))
            }
        }

        impl From<$inner> for $name {
            fn from(inner: $inner) -> Self {
                Self(inner)
            }
        }

        impl From<$name> for $inner {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = TypeParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&decode_prefixed(s.trim())?)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

fixed_hex!(
    /// A 20-byte account or contract address.
    Address,
    H160,
    20
);
fixed_hex!(
    /// A 32-byte word: parameter hashes, transaction hashes, event topics.
    Bytes32,
    H256,
    32
);

// ---------------------------------------------------------------------------
// Permission mask
// ---------------------------------------------------------------------------

/// Fixed-width permission bitmask granted to a module on registration.
///
/// Rendered as `0x` + 8 uppercase hex digits, e.g. `0x0000001F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionMask(pub u32);

impl PermissionMask {
    /// Canonical mask for a scheme described by capability flags.
    ///
    /// Only the strongest capability counts: register > generic call >
    /// upgrade > global constraints.
    pub fn from_capabilities(
        can_register_schemes: bool,
        can_delegate_call: bool,
        can_upgrade_controller: bool,
        can_manage_global_constraints: bool,
    ) -> Self {
        use crate::constants::permissions;
        if can_register_schemes {
            permissions::ALL
        } else if can_delegate_call {
            permissions::GENERIC_CALL
        } else if can_upgrade_controller {
            permissions::UPGRADE
        } else if can_manage_global_constraints {
            permissions::GLOBAL_CONSTRAINTS
        } else {
            permissions::NONE
        }
    }

    pub fn contains(&self, other: PermissionMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Big-endian `bytes4` as passed to the controller.
    pub fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for PermissionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl FromStr for PermissionMask {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .filter(|b| b.len() == 8)
            .ok_or_else(|| TypeParseError::PermissionMask(s.to_owned()))?;
        u32::from_str_radix(body, 16)
            .map(Self)
            .map_err(|_| TypeParseError::PermissionMask(s.to_owned()))
    }
}

impl Serialize for PermissionMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PermissionMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Number of decimals used by every token and reputation contract.
pub const WEI_DECIMALS: usize = 18;

/// A decimal token quantity as written in a parameter document (`"1.5"`, `100`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount(String);

impl Default for Amount {
    fn default() -> Self {
        Self("0".to_owned())
    }
}

impl Amount {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0' || c == '.')
    }

    /// Exact conversion to the smallest unit (18 decimals).
    pub fn to_wei(&self) -> Result<U256, TypeParseError> {
        let fail = |reason: &str| TypeParseError::Amount {
            value: self.0.clone(),
            reason: reason.to_owned(),
        };
        let (int_part, frac_part) = match self.0.split_once('.') {
            Some((i, f)) => (i, f),
            None => (self.0.as_str(), ""),
        };
        if frac_part.len() > WEI_DECIMALS {
            return Err(fail("more than 18 fractional digits"));
        }
        let int = if int_part.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(int_part).map_err(|_| fail("not a decimal number below 2^256"))?
        };
        let frac = if frac_part.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{frac_part:0<width$}", width = WEI_DECIMALS);
            U256::from_dec_str(&padded).map_err(|_| fail("not a decimal number"))?
        };
        int.checked_mul(U256::exp10(WEI_DECIMALS))
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| fail("overflows uint256"))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Amount {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let well_formed = !s.is_empty()
            && s != "."
            && s.chars().all(|c| c.is_ascii_digit() || c == '.')
            && s.matches('.').count() <= 1;
        if !well_formed {
            return Err(TypeParseError::Amount {
                value: s.to_owned(),
                reason: "not a non-negative decimal number".to_owned(),
            });
        }
        let amount = Self(s.to_owned());
        amount.to_wei()?;
        Ok(amount)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Int(u64),
            Float(f64),
        }
        let text = match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s,
            Repr::Int(i) => i.to_string(),
            Repr::Float(f) if f.is_finite() && f >= 0.0 => f.to_string(),
            Repr::Float(f) => return Err(de::Error::custom(format!("invalid amount {f}"))),
        };
        text.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
