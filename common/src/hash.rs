use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{fmt, ops::Deref, str::FromStr};

/// Data that is a cryptographic digest of `BYTES` long.
///
/// Bytes are held in internal (wire) order. Hex formatting and parsing use
/// the conventional reversed byte order in which transaction and block
/// identifiers are quoted, so a hash printed here can be pasted into any
/// explorer.
///
/// # Examples
///
/// ```ignore
/// use agora_common::TxHash;
///
/// let hash: TxHash = "f702453dd03b0f055e5437d76128141803984fb10acb85fc3b2184fae2f3fa78"
///     .parse()
///     .unwrap();
/// assert_eq!(hash.to_string().len(), 64);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const BYTES: usize>([u8; BYTES]);

/// Transaction identifier
pub type TxHash = Hash<32>;

/// Block identifier
pub type BlockHash = Hash<32>;

impl<const BYTES: usize> Default for Hash<BYTES> {
    fn default() -> Self {
        Self::new([0u8; BYTES])
    }
}

// Implement Serialize/Deserialize manually since generic const arrays don't auto-derive
impl<const BYTES: usize> Serialize for Hash<BYTES> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de, const BYTES: usize> Deserialize<'de> for Hash<BYTES> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<const BYTES: usize> Hash<BYTES> {
    /// Creates a new hash from a byte array in internal order.
    #[inline]
    pub const fn new(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }

    /// True for the all-zero hash
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Consumes the hash and returns the inner byte array.
    #[inline]
    pub fn into_inner(self) -> [u8; BYTES] {
        self.0
    }
}

impl Hash<32> {
    /// Double SHA-256 of the given data
    pub fn digest(data: &[u8]) -> Self {
        let once = Sha256::digest(data);
        let twice = Sha256::digest(once);
        Self::new(twice.into())
    }
}

impl<const BYTES: usize> From<[u8; BYTES]> for Hash<BYTES> {
    #[inline]
    fn from(bytes: [u8; BYTES]) -> Self {
        Self::new(bytes)
    }
}

impl<const BYTES: usize> TryFrom<&[u8]> for Hash<BYTES> {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let hash: [u8; BYTES] = value.try_into()?;
        Ok(Self::new(hash))
    }
}

impl<const BYTES: usize> AsRef<[u8]> for Hash<BYTES> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const BYTES: usize> Deref for Hash<BYTES> {
    type Target = [u8; BYTES];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const BYTES: usize> fmt::Debug for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("Hash<{BYTES}>")).field(&self.to_string()).finish()
    }
}

impl<const BYTES: usize> fmt::Display for Hash<BYTES> {
    /// Formats the hash as lowercase hex in reversed byte order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

impl<const BYTES: usize> FromStr for Hash<BYTES> {
    type Err = hex::FromHexError;

    /// Parses a hash from hex in reversed byte order.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hexadecimal or does not
    /// decode to exactly `BYTES` bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BYTES];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        let text = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let hash: BlockHash = text.parse().unwrap();
        assert_eq!(hash.to_string(), text);

        // Internal order is the reverse of the display order
        assert_eq!(hash[31], 0x00);
        assert_eq!(hash[0], 0x6f);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!("abcd".parse::<TxHash>().is_err());
    }

    #[test]
    fn digest_of_empty_transaction_bytes() {
        let hash = TxHash::digest(&[0u8; 10]);
        assert_eq!(
            hash.to_string(),
            "f702453dd03b0f055e5437d76128141803984fb10acb85fc3b2184fae2f3fa78"
        );
    }

    #[test]
    fn default_is_null() {
        assert!(TxHash::default().is_null());
        assert!(!TxHash::new([1u8; 32]).is_null());
    }

    #[test]
    fn serde_uses_display_form() {
        let hash = TxHash::new([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
