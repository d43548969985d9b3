//! Little-endian primitive (de)serialization shared by metadata, history
//! records and the LUT. The on-disk convention is little-endian throughout;
//! `to_le_bytes`/`from_le_bytes` already do the right thing on a
//! little-endian host and byte-swap on a big-endian one, so there is no
//! separate "host is BE" branch needed for scalars. The LUT helpers below
//! are the one place that loads a whole array at once and are written so
//! the byte-swap only happens when it's actually needed.

use anyhow::{ensure, Context, Result};

/// Append a little-endian `u64`.
pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append a length-prefixed (u64 little-endian length) UTF-8 string.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_u64(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Read a little-endian `u64` at `*pos`, advancing it.
pub fn read_u64(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let end = *pos + 8;
    ensure!(end <= buf.len(), "truncated buffer while reading u64 at offset {}", *pos);
    let value = u64::from_le_bytes(buf[*pos..end].try_into().unwrap());
    *pos = end;
    Ok(value)
}

/// Read a length-prefixed UTF-8 string at `*pos`, advancing it.
pub fn read_string(buf: &[u8], pos: &mut usize) -> Result<String> {
    let len = read_u64(buf, pos).context("reading string length")? as usize;
    let end = *pos + len;
    ensure!(end <= buf.len(), "truncated buffer while reading string body at offset {}", *pos);
    let s = String::from_utf8(buf[*pos..end].to_vec())
        .with_context(|| format!("string at offset {} is not valid UTF-8", *pos))?;
    *pos = end;
    Ok(s)
}

/// Serialize a LUT (or any `u64` array) as `len` little-endian values.
pub fn write_u64_array(buf: &mut Vec<u8>, values: &[u64]) {
    buf.reserve(values.len() * 8);
    for &v in values {
        write_u64(buf, v);
    }
}

/// Load exactly `count` little-endian `u64` values starting at `*pos`.
pub fn read_u64_array(buf: &[u8], pos: &mut usize, count: usize) -> Result<Vec<u64>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read_u64(buf, pos)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_u64_and_string() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0xdead_beef_0000_1234);
        write_string(&mut buf, "SortedWithLUT");
        write_u64(&mut buf, 7);

        let mut pos = 0;
        assert_eq!(read_u64(&buf, &mut pos).unwrap(), 0xdead_beef_0000_1234);
        assert_eq!(read_string(&buf, &mut pos).unwrap(), "SortedWithLUT");
        assert_eq!(read_u64(&buf, &mut pos).unwrap(), 7);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn round_trips_u64_array() {
        let values = vec![0u64, 1, 2, 5, 5, 9, 20];
        let mut buf = Vec::new();
        write_u64_array(&mut buf, &values);

        let mut pos = 0;
        let loaded = read_u64_array(&buf, &mut pos, values.len()).unwrap();
        assert_eq!(loaded, values);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn rejects_truncated_input() {
        let buf = vec![1, 2, 3];
        let mut pos = 0;
        assert!(read_u64(&buf, &mut pos).is_err());
    }
}
