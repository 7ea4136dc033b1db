//! Canonical wire encoding helpers
//!
//! Variable length integers use the compact-size form: values below 0xfd
//! take one byte, larger values a marker byte followed by a little-endian
//! u16, u32 or u64.

/// Byte sink for canonical serialisation
pub struct WireWriter {
    data: Vec<u8>,
}

impl WireWriter {
    /// Construct with a capacity hint
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn push_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Push a compact-size integer
    pub fn push_varint(&mut self, value: u64) {
        match value {
            0..=0xfc => self.data.push(value as u8),
            0xfd..=0xffff => {
                self.data.push(0xfd);
                self.data.extend_from_slice(&(value as u16).to_le_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.data.push(0xfe);
                self.data.extend_from_slice(&(value as u32).to_le_bytes());
            }
            _ => {
                self.data.push(0xff);
                self.data.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    /// Push a length-prefixed byte string
    pub fn push_var_bytes(&mut self, bytes: &[u8]) {
        self.push_varint(bytes.len() as u64);
        self.push_bytes(bytes);
    }

    /// Get the resulting vector
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Encoded size of a compact-size integer
pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize_varint(value: u64) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(9);
        writer.push_varint(value);
        writer.into_vec()
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(serialize_varint(0), vec![0]);
        assert_eq!(serialize_varint(0xfc), vec![0xfc]);
        assert_eq!(serialize_varint(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(serialize_varint(0x1_0000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(serialize_varint(u64::MAX), vec![0xff; 9]);
    }

    #[test]
    fn varint_size_matches_encoding() {
        for value in [0, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
            assert_eq!(varint_size(value), serialize_varint(value).len());
        }
    }
}
