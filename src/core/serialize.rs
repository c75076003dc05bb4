// Canonical serialization helpers
//
// Every hash preimage and every on-disk record goes through these helpers, so
// the byte layout must be identical across platforms: varints for counts,
// length-prefixed byte strings, and fixed 8-byte big-endian two's complement
// for integers.

use std::io::{self, Read};

use crate::error::{ChainError, Result};

/// Types with a deterministic byte encoding that round-trips.
pub trait Serializable: Sized {
    fn serialize(&self) -> Vec<u8>;
    fn deserialize(data: &[u8]) -> Result<Self>;
}

/// Write a variable-length integer (compact size encoding).
pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => buf.push(value as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xffffffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Read a variable-length integer.
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;

    match first[0] {
        0xfd => {
            let mut bytes = [0u8; 2];
            reader.read_exact(&mut bytes)?;
            Ok(u16::from_le_bytes(bytes) as u64)
        }
        0xfe => {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            Ok(u32::from_le_bytes(bytes) as u64)
        }
        0xff => {
            let mut bytes = [0u8; 8];
            reader.read_exact(&mut bytes)?;
            Ok(u64::from_le_bytes(bytes))
        }
        small => Ok(small as u64),
    }
}

/// Write a byte string with a varint length prefix.
pub fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Read a length-prefixed byte string.
pub fn read_var_bytes<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_varint(reader)? as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Write a signed 64-bit integer as 8 bytes, big-endian two's complement.
/// Used wherever integers enter a hash preimage.
pub fn write_int_be(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// The standalone form of [`write_int_be`], for preimage assembly.
pub fn int_to_be(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Read a big-endian signed 64-bit integer.
pub fn read_int_be<R: Read + ?Sized>(reader: &mut R) -> io::Result<i64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(i64::from_be_bytes(bytes))
}

/// Map a truncated or malformed record onto the store-corruption error.
pub(crate) fn corrupt(err: io::Error) -> ChainError {
    ChainError::CorruptStore(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn varint_round_trip() {
        for value in [0u64, 1, 0xfc, 0xfd, 1000, 0xffff, 0x10000, 100_000, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            let decoded = read_varint(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn varint_width_boundaries() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0xfc);
        assert_eq!(buf.len(), 1);

        buf.clear();
        write_varint(&mut buf, 0xfd);
        assert_eq!(buf.len(), 3);

        buf.clear();
        write_varint(&mut buf, 0x10000);
        assert_eq!(buf.len(), 5);

        buf.clear();
        write_varint(&mut buf, u64::MAX);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn var_bytes_round_trip() {
        let data = b"transaction payload";
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, data);

        let decoded = read_var_bytes(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn var_bytes_empty() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, &[]);
        assert_eq!(buf, vec![0]);

        let decoded = read_var_bytes(&mut Cursor::new(&buf)).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn int_be_layout() {
        assert_eq!(int_to_be(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(int_to_be(-1), [0xff; 8]);
        assert_eq!(int_to_be(24), [0, 0, 0, 0, 0, 0, 0, 24]);
    }

    #[test]
    fn int_be_round_trip() {
        for value in [i64::MIN, -1, 0, 1, 24, i64::MAX] {
            let mut buf = Vec::new();
            write_int_be(&mut buf, value);
            let decoded = read_int_be(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn truncated_input_errors() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, b"hello");
        buf.truncate(3);
        assert!(read_var_bytes(&mut Cursor::new(&buf)).is_err());
    }
}
