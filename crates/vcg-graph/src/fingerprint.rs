//! Content fingerprints
//!
//! Provides [`Fingerprint`], a strongly-typed 32-byte Blake3 digest of a
//! graph's canonical JSON encoding. Used by auto-save to detect whether a
//! snapshot differs from the last persisted one.

use crate::error::FingerprintError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte content fingerprint (Blake3)
///
/// Immutable and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FingerprintError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FingerprintError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Blake3 digest of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    /// Digest of a serializable value's JSON encoding
    ///
    /// Canonical as long as the value serializes maps in key order.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn of_serializable<T>(value: &T) -> Result<Self, FingerprintError>
    where
        T: serde::Serialize + ?Sized,
    {
        let json = serde_json::to_vec(value)?;
        Ok(Self::compute(&json))
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(Fingerprint::compute(b"graph"), Fingerprint::compute(b"graph"));
        assert_ne!(Fingerprint::compute(b"graph-a"), Fingerprint::compute(b"graph-b"));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let result = Fingerprint::from_slice(&[1u8; 31]);
        assert!(matches!(
            result,
            Err(FingerprintError::InvalidLength {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn display_and_parse() {
        let fp = Fingerprint::compute(b"test");
        let parsed: Fingerprint = fp.to_string().parse().unwrap();
        assert_eq!(fp, parsed);
        assert!(fp.to_string().starts_with(&fp.short()));
        assert_eq!(fp.short().len(), 16);
    }

    #[test]
    fn serde_as_hex_string() {
        let fp = Fingerprint::compute(b"test");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json.len(), 66);
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }

    #[test]
    fn serializable_key_order_is_canonical() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let mut b = std::collections::BTreeMap::new();
        b.insert("a", 1);
        b.insert("b", 2);
        assert_eq!(
            Fingerprint::of_serializable(&a).unwrap(),
            Fingerprint::of_serializable(&b).unwrap()
        );
    }
}
