//! Strong identifier types for SealVault.
//!
//! Identifiers are store-native 12-byte keys. Over the wire they travel as
//! 24-char lowercase hex tokens, and every crossing from wire to store goes
//! through [`ObjectId::parse`].

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Length of an [`ObjectId`] in bytes.
pub const OBJECT_ID_LEN: usize = 12;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_RANDOM: OnceLock<[u8; 5]> = OnceLock::new();

/// A 12-byte document identifier.
///
/// Layout on generation: 4-byte big-endian Unix seconds, 5 random bytes
/// fixed per process, 3-byte big-endian counter. Ids generated in the same
/// process sort by creation order until the counter wraps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub [u8; OBJECT_ID_LEN]);

impl ObjectId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let secs = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let random = PROCESS_RANDOM.get_or_init(rand::random);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; OBJECT_ID_LEN];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(random);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    /// Convert to the 24-char wire form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; OBJECT_ID_LEN] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// Parse a wire token, failing with [`ValidationError::InvalidId`].
    ///
    /// Surrounding whitespace is ignored; upper-case hex is accepted.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Self::from_hex(s.trim()).map_err(|_| ValidationError::InvalidId(s.to_string()))
    }

    /// The creation second encoded in the id.
    pub fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; OBJECT_ID_LEN]> for ObjectId {
    fn from(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ObjectId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; OBJECT_ID_LEN] = slice.try_into()?;
        Ok(Self(arr))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ObjectId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_id_hex_roundtrip() {
        let id = ObjectId::from_hex("6512a3f9e1d2c4b8a0112233").unwrap();
        assert_eq!(id.to_hex(), "6512a3f9e1d2c4b8a0112233");
        assert_eq!(id.timestamp_secs(), 0x6512a3f9);
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(ObjectId::parse("").is_err());
        assert!(ObjectId::parse("6512a3f9").is_err());
        assert!(ObjectId::parse("zz12a3f9e1d2c4b8a0112233").is_err());
        assert!(ObjectId::parse("6512a3f9e1d2c4b8a011223344").is_err());
        assert_eq!(
            ObjectId::parse("not-an-id"),
            Err(ValidationError::InvalidId("not-an-id".into()))
        );
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id = ObjectId::parse(" 6512A3F9E1D2C4B8A0112233 ").unwrap();
        assert_eq!(id.to_string(), "6512a3f9e1d2c4b8a0112233");
    }

    #[test]
    fn test_generated_ids_increase() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert!(b > a);
        assert_eq!(a.as_bytes()[4..9], b.as_bytes()[4..9]);
        assert_eq!(a.to_hex().len(), 24);
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let id = ObjectId::from_bytes([0xab; 12]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abababababababababababab\"");
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ObjectId>("\"abc\"").is_err());
    }

    proptest! {
        #[test]
        fn parse_accepts_exactly_its_own_output(bytes in any::<[u8; 12]>()) {
            let id = ObjectId::from_bytes(bytes);
            prop_assert_eq!(ObjectId::parse(&id.to_hex()).unwrap(), id);
        }

        #[test]
        fn parse_never_panics(s in ".{0,40}") {
            let _ = ObjectId::parse(&s);
        }
    }
}
