//! Fixed-size byte newtypes
//!
//! Content addresses, public keys and signatures are all fixed-size byte
//! arrays on the wire. Wrapping them in semantic newtypes keeps them from
//! being mixed up at call sites.

use std::fmt;

/// Defines a fixed-size byte newtype with hex formatting, conversions,
/// serde (as raw bytes) and borsh (for deterministic content encoding).
macro_rules! byte_newtype {
    ($name:ident, $len:expr, $doc:expr, [$($derives:ident),*]) => {
        #[doc = $doc]
        #[derive(
            Clone,
            Copy,
            serde::Serialize,
            serde::Deserialize,
            borsh::BorshSerialize,
            borsh::BorshDeserialize,
            $($derives),*
        )]
        #[repr(transparent)]
        pub struct $name(#[serde(with = "serde_bytes")] pub [u8; $len]);

        impl $name {
            /// Borrow the inner bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Copy the inner bytes into a vector.
            pub fn to_vec(&self) -> Vec<u8> {
                self.0.to_vec()
            }

            /// Parse from a hex string.
            pub fn from_hex(hex_str: &str) -> Result<Self, String> {
                let bytes = hex::decode(hex_str)
                    .map_err(|e| format!("invalid hex: {}", e))?;
                <[u8; $len]>::try_from(bytes.as_slice()).map(Self).map_err(|_| {
                    format!(
                        "expected {} hex characters, got {}",
                        $len * 2,
                        hex_str.len()
                    )
                })
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(value: $name) -> [u8; $len] {
                value.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = [u8; $len];
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;
            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(<[u8; $len]>::try_from(slice)?))
            }
        }

        impl TryFrom<Vec<u8>> for $name {
            type Error = Vec<u8>;
            fn try_from(vec: Vec<u8>) -> Result<Self, Self::Error> {
                match <[u8; $len]>::try_from(vec.as_slice()) {
                    Ok(arr) => Ok(Self(arr)),
                    Err(_) => Err(vec),
                }
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(self, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:x})", stringify!($name), self)
            }
        }
    };
}

byte_newtype!(
    Hash,
    32,
    "32-byte BLAKE3 content address",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);
}

byte_newtype!(
    PubKey,
    32,
    "32-byte Ed25519 public key",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

byte_newtype!(
    Signature,
    64,
    "64-byte Ed25519 signature",
    [PartialEq, Eq]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_formats_as_hex() {
        let hash = Hash([0x5a; 32]);
        let hex = "5a".repeat(32);
        assert_eq!(hash.to_string(), hex);
        assert_eq!(format!("{:?}", hash), format!("Hash({})", hex));
    }

    #[test]
    fn hex_round_trips() {
        let hash = Hash([0xab; 32]);
        assert_eq!(Hash::from_hex(&hash.to_string()), Ok(hash));
        assert!(Hash::from_hex("5a5a").is_err());
        assert!(Hash::from_hex("not hex").is_err());
    }

    #[test]
    fn conversions_round_trip() {
        let bytes = [7u8; 32];
        let key: PubKey = bytes.into();
        assert_eq!(key.as_bytes(), &bytes);
        let back: [u8; 32] = key.into();
        assert_eq!(back, bytes);
    }

    #[test]
    fn try_from_rejects_wrong_length() {
        assert!(Hash::try_from(vec![1u8; 31]).is_err());
        assert!(Signature::try_from(&[0u8; 63][..]).is_err());
        assert!(Hash::try_from(vec![1u8; 32]).is_ok());
    }
}
