//! ROOT compression-block decompression.
//!
//! Compressed key payloads are a sequence of blocks, each with a 9-byte
//! header:
//! ```text
//! bytes 0-1:  algorithm tag ("ZL", "L4", "ZS", "XZ")
//! byte  2:    method
//! bytes 3-5:  compressed size   (3-byte little-endian)
//! bytes 6-8:  uncompressed size (3-byte little-endian)
//! ```
//! followed immediately by the compressed payload.

use crate::root::error::{Result, RootError};

/// Decompress a ROOT-compressed payload into `expected_len` bytes.
pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut offset = 0;

    while out.len() < expected_len && offset + 9 <= src.len() {
        let tag = &src[offset..offset + 2];
        let c_size = read_len24(&src[offset + 3..offset + 6]);
        let u_size = read_len24(&src[offset + 6..offset + 9]);
        offset += 9;

        let end = offset + c_size;
        if end > src.len() {
            return Err(RootError::Decompression(format!(
                "block claims {} compressed bytes but only {} remain",
                c_size,
                src.len() - offset
            )));
        }
        let block = &src[offset..end];

        let inflated = match tag {
            b"ZL" => inflate_zlib(block, u_size)?,
            b"L4" => inflate_lz4(block, u_size)?,
            b"ZS" => inflate_zstd(block, u_size)?,
            _ => {
                return Err(RootError::Decompression(format!(
                    "unsupported compression algorithm: {:?}",
                    std::str::from_utf8(tag).unwrap_or("??")
                )));
            }
        };

        if inflated.len() != u_size {
            return Err(RootError::Decompression(format!(
                "expected {} uncompressed bytes in block, got {}",
                u_size,
                inflated.len()
            )));
        }

        out.extend_from_slice(&inflated);
        offset = end;
    }

    if out.len() != expected_len {
        return Err(RootError::Decompression(format!(
            "total decompressed length {} != expected {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

fn inflate_zlib(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| RootError::Decompression(format!("zlib: {}", e)))?;
    Ok(out)
}

fn inflate_lz4(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    // ROOT prefixes LZ4 payloads with an 8-byte xxhash64 of the uncompressed
    // data; verification is skipped.
    if data.len() < 8 {
        return Err(RootError::Decompression(
            "LZ4 block too small for checksum header".into(),
        ));
    }
    lz4_flex::decompress(&data[8..], expected)
        .map_err(|e| RootError::Decompression(format!("lz4: {}", e)))
}

fn inflate_zstd(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut decoder = ruzstd::decoding::StreamingDecoder::new(data)
        .map_err(|e| RootError::Decompression(format!("zstd: {}", e)))?;
    let mut out = Vec::with_capacity(expected);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RootError::Decompression(format!("zstd: {}", e)))?;
    Ok(out)
}

/// 3-byte little-endian length field.
fn read_len24(b: &[u8]) -> usize {
    b[0] as usize | ((b[1] as usize) << 8) | ((b[2] as usize) << 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(tag: &[u8; 2], method: u8, compressed: &[u8], u_len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.push(method);
        let c_len = compressed.len();
        out.extend_from_slice(&[
            (c_len & 0xff) as u8,
            ((c_len >> 8) & 0xff) as u8,
            ((c_len >> 16) & 0xff) as u8,
            (u_len & 0xff) as u8,
            ((u_len >> 8) & 0xff) as u8,
            ((u_len >> 16) & 0xff) as u8,
        ]);
        out.extend_from_slice(compressed);
        out
    }

    #[test]
    fn len24_is_little_endian() {
        assert_eq!(read_len24(&[0x10, 0x00, 0x00]), 16);
        assert_eq!(read_len24(&[0x00, 0x01, 0x00]), 256);
        assert_eq!(read_len24(&[0xff, 0xff, 0xff]), 0xff_ffff);
    }

    #[test]
    fn zlib_round_trip() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let original = b"histogram payload, histogram payload, histogram payload";
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(original).unwrap();
        let compressed = enc.finish().unwrap();

        let data = block(b"ZL", 0x08, &compressed, original.len());
        assert_eq!(decompress(&data, original.len()).unwrap(), original);
    }

    #[test]
    fn lz4_round_trip() {
        let original = b"time slices time slices time slices time slices";
        let compressed = lz4_flex::compress(original);
        // Fake checksum header; the decoder skips it.
        let mut payload = vec![0u8; 8];
        payload.extend_from_slice(&compressed);

        let data = block(b"L4", 0x04, &payload, original.len());
        assert_eq!(decompress(&data, original.len()).unwrap(), original);
    }

    #[test]
    fn zstd_round_trip() {
        let original = b"tower contents tower contents tower contents";
        let compressed = ruzstd::encoding::compress_to_vec(
            &original[..],
            ruzstd::encoding::CompressionLevel::Fastest,
        );

        let data = block(b"ZS", 0x05, &compressed, original.len());
        assert_eq!(decompress(&data, original.len()).unwrap(), original);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let data = block(b"XX", 0, &[0u8; 4], 4);
        assert!(matches!(
            decompress(&data, 4),
            Err(RootError::Decompression(_))
        ));
    }
}
