#![doc = include_str!("../README.md")]

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::io;
use thiserror::Error;

mod crc;
mod dictionary;

use dictionary::{DictionaryReference, TokenDictionary};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0:?}")]
    IoError(#[from] io::Error),
    #[error("COMPSIZE mismatch: {0}")]
    CompressedSizeMismatch(u32),
    #[error("COMPRESSED CRC mismatch: 0x{0:08X}")]
    CompressedCrcMismatch(u32),
    #[error("Invalid COMPTYPE: 0x{0:08X}")]
    InvalidCompressionType(u32),
    #[error("Dictionary reference error: {0:?}")]
    DictionaryError(#[from] dictionary::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

const COMPRESSED: u32 = 0x75465A4C;
const UNCOMPRESSED: u32 = 0x414C454D;

pub fn decompress_rtf(data: &[u8]) -> Result<String> {
    let total_size = data.len();
    let mut cursor = Cursor::new(&data[..16]);
    let compressed_size = cursor.read_u32::<LittleEndian>()?;

    if compressed_size as usize + size_of_val(&compressed_size) != total_size {
        return Err(Error::CompressedSizeMismatch(compressed_size));
    }

    let raw_size = cursor.read_u32::<LittleEndian>()?;
    let compression_type = cursor.read_u32::<LittleEndian>()?;
    let crc = cursor.read_u32::<LittleEndian>()?;

    match compression_type {
        COMPRESSED => {
            let compressed_crc = crc::calculate_crc(0, &data[16..]);
            if crc != compressed_crc {
                return Err(Error::CompressedCrcMismatch(crc));
            }

            let mut dictionary = TokenDictionary::default();
            let mut output = Vec::with_capacity(raw_size as usize);

            let mut cursor = Cursor::new(&data[16..]);
            'decompress: while let Ok(control) = cursor.read_u8() {
                for i in 0..8 {
                    let bit = control & (0x01 << i);
                    if bit == 0 {
                        let Ok(byte) = cursor.read_u8() else {
                            break 'decompress;
                        };
                        output.push(byte);
                        dictionary.write_byte(byte);
                    } else {
                        let reference = DictionaryReference::read(&mut cursor)?;
                        let Some(mut reference) = dictionary.read_reference(reference) else {
                            break 'decompress;
                        };
                        output.append(&mut reference);
                    }
                }
            }

            let buffer: Vec<_> = output.into_iter().map(u16::from).collect();
            Ok(String::from_utf16_lossy(&buffer))
        }
        UNCOMPRESSED => {
            let data: Vec<_> = data[16..raw_size as usize + 16]
                .iter()
                .copied()
                .map(u16::from)
                .collect();
            Ok(String::from_utf16_lossy(&data))
        }
        invalid => Err(Error::InvalidCompressionType(invalid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPRESSED_SIMPLE_RTF: &[u8] = &[
        0x2d, 0x00, 0x00, 0x00, 0x2b, 0x00, 0x00, 0x00, 0x4c, 0x5a, 0x46, 0x75, 0xf1, 0xc5, 0xc7,
        0xa7, 0x03, 0x00, 0x0a, 0x00, 0x72, 0x63, 0x70, 0x67, 0x31, 0x32, 0x35, 0x42, 0x32, 0x0a,
        0xf3, 0x20, 0x68, 0x65, 0x6c, 0x09, 0x00, 0x20, 0x62, 0x77, 0x05, 0xb0, 0x6c, 0x64, 0x7d,
        0x0a, 0x80, 0x0f, 0xa0,
    ];

    const UNCOMPRESSED_SIMPLE_RTF: &str = "{\\rtf1\\ansi\\ansicpg1252\\pard hello world}\r\n";

    /// [Example 1: Simple Compressed RTF](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxrtfcp/029bff74-8c00-402e-ac2b-0210a5f57371)
    #[test]
    fn test_decompress_simple_rtf() {
        let rtf = decompress_rtf(COMPRESSED_SIMPLE_RTF).unwrap();
        assert_eq!(rtf, UNCOMPRESSED_SIMPLE_RTF);
    }

    const COMPRESSED_CROSSING_WRITE_RTF: &[u8] = &[
        0x1a, 0x00, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x4c, 0x5a, 0x46, 0x75, 0xe2, 0xd4, 0x4b,
        0x51, 0x41, 0x00, 0x04, 0x20, 0x57, 0x58, 0x59, 0x5a, 0x0d, 0x6e, 0x7d, 0x01, 0x0e, 0xb0,
    ];

    const UNCOMPRESSED_CROSSING_WRITE_RTF: &str = "{\\rtf1 WXYZWXYZWXYZWXYZWXYZ}";

    /// [Example 2: Reading a Token from the Dictionary that Crosses WritePosition](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxrtfcp/421a2da5-7752-4985-8981-0f19f1e5b687)
    #[test]
    fn test_decompress_crossing_write_rtf() {
        let rtf = decompress_rtf(COMPRESSED_CROSSING_WRITE_RTF).unwrap();
        assert_eq!(rtf, UNCOMPRESSED_CROSSING_WRITE_RTF);
    }

    #[test]
    fn test_decompress_rejects_bad_size() {
        let mut bad = COMPRESSED_SIMPLE_RTF.to_vec();
        bad[0] = 0xff;
        assert!(matches!(
            decompress_rtf(&bad),
            Err(Error::CompressedSizeMismatch(_))
        ));
    }

    #[test]
    fn test_decompress_rejects_unknown_comptype() {
        let mut bad = COMPRESSED_SIMPLE_RTF.to_vec();
        bad[8..12].copy_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            decompress_rtf(&bad),
            Err(Error::InvalidCompressionType(0))
        ));
    }
}
