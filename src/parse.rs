use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::QueryError;

/// Left-to-right reader over a reply payload.
///
/// Every read checks the remaining length first, so a short or corrupt
/// packet surfaces as [QueryError::MalformedPacket] instead of a panic.
/// The offset only moves forward, and only after a successful read.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Take the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], QueryError> {
        if self.remaining() < len {
            return Err(QueryError::MalformedPacket(format!(
                "needed {} bytes at offset {}, only {} left",
                len,
                self.offset,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), QueryError> {
        self.take(len).map(|_| ())
    }

    pub fn get_u8(&mut self) -> Result<u8, QueryError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16_be(&mut self) -> Result<u16, QueryError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn get_u16_le(&mut self) -> Result<u16, QueryError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn get_u32_be(&mut self) -> Result<u32, QueryError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn get_i32_le(&mut self) -> Result<i32, QueryError> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// Get a null-terminated string.
    ///
    /// The text runs up to the first NUL; that terminator is consumed but
    /// not returned, and any NUL padding after it is left for the next read.
    /// Invalid UTF-8 is replaced rather than rejected; server names are
    /// frequently in legacy encodings.
    pub fn get_string(&mut self) -> Result<String, QueryError> {
        let rest = &self.data[self.offset..];
        let end = rest.iter().position(|c| *c == 0).ok_or_else(|| {
            QueryError::MalformedPacket(format!(
                "unterminated string at offset {}",
                self.offset
            ))
        })?;
        self.offset += end + 1;

        Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
    }
}

/// Render bytes as lowercase hex.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixed_width_fields_in_order() {
        let data = [0x07, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x34, 0x12];
        let mut cursor = Cursor::new(&data);
        assert_eq!(cursor.get_u8().unwrap(), 0x07);
        assert_eq!(cursor.get_u16_be().unwrap(), 0x0102);
        assert_eq!(cursor.get_u32_be().unwrap(), 0x0304_0506);
        assert_eq!(cursor.get_u16_le().unwrap(), 0x1234);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn short_read_fails_without_moving() {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = Cursor::new(&data);
        cursor.skip(1).unwrap();
        let err = cursor.get_u32_be().unwrap_err();
        assert!(matches!(err, QueryError::MalformedPacket(_)));
        assert_eq!(cursor.offset(), 1);
        assert_eq!(cursor.get_u16_be().unwrap(), 0x0203);
    }

    #[test]
    fn string_stops_at_terminator() {
        let data = b"Test Server\0rest\0";
        let mut cursor = Cursor::new(data);
        assert_eq!(cursor.get_string().unwrap(), "Test Server");
        assert_eq!(cursor.get_string().unwrap(), "rest");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn padding_after_terminator_is_left_unread() {
        let mut cursor = Cursor::new(b"Test Server\0\0\0\x07");
        assert_eq!(cursor.get_string().unwrap(), "Test Server");
        assert_eq!(cursor.offset(), 12);
        assert_eq!(cursor.get_string().unwrap(), "");
        assert_eq!(cursor.get_string().unwrap(), "");
        assert_eq!(cursor.get_u8().unwrap(), 0x07);
    }

    #[test]
    fn empty_string_is_valid() {
        let mut cursor = Cursor::new(b"\0");
        assert_eq!(cursor.get_string().unwrap(), "");
    }

    #[test]
    fn unterminated_string_is_malformed() {
        let mut cursor = Cursor::new(b"no end");
        assert!(matches!(
            cursor.get_string(),
            Err(QueryError::MalformedPacket(_))
        ));
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut cursor = Cursor::new(&[b'a', 0xff, b'b', 0]);
        assert_eq!(cursor.get_string().unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0a, 0xff]), "000aff");
        assert_eq!(hex(&[]), "");
    }
}
