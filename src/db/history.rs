//! Provenance record appended to a database each time it is written
//! (component C11): when, how long, peak memory, the command line that
//! produced it, a free-form info string, captured stdout/stderr, and a
//! one-line description of the machine that did the writing.
//!
//! Every field is serialized as `(name, type tag, value)` rather than
//! `(name, value)` with the type inferred from the field name. That
//! extra tag byte is what makes "skip an unrecognized field" actually
//! safe: without it, a reader encountering a field it doesn't know the
//! type of has no way to know how many bytes to skip.

use anyhow::{bail, Result};

use super::serialization::{read_string, read_u64, write_string, write_u64};

const TAG_U64: u8 = 0;
const TAG_STRING: u8 = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryItem {
    pub open_time: u64,
    pub close_time: u64,
    pub mem_peak_bytes: u64,
    pub command_line: String,
    pub info: String,
    pub system_info: String,
    pub std_cout: String,
    pub std_cerr: String,
}

impl HistoryItem {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u64_field(&mut out, "open_time", self.open_time);
        write_u64_field(&mut out, "close_time", self.close_time);
        write_u64_field(&mut out, "mem_peak_bytes", self.mem_peak_bytes);
        write_string_field(&mut out, "command_line", &self.command_line);
        write_string_field(&mut out, "system_info", &self.system_info);
        write_string_field(&mut out, "info", &self.info);
        write_string_field(&mut out, "std_cout", &self.std_cout);
        write_string_field(&mut out, "std_cerr", &self.std_cerr);
        out
    }

    /// Unrecognized field names are skipped (their tagged value is still
    /// read, just discarded), so records written by a newer version with
    /// extra fields stay loadable here.
    pub fn load(buf: &[u8]) -> Result<HistoryItem> {
        let mut item = HistoryItem::default();
        let mut pos = 0;
        while pos < buf.len() {
            let name = read_string(buf, &mut pos)?;
            let value = read_tagged_value(buf, &mut pos)?;
            match (name.as_str(), value) {
                ("open_time", FieldValue::U64(v)) => item.open_time = v,
                ("close_time", FieldValue::U64(v)) => item.close_time = v,
                ("mem_peak_bytes", FieldValue::U64(v)) => item.mem_peak_bytes = v,
                ("command_line", FieldValue::String(v)) => item.command_line = v,
                ("system_info", FieldValue::String(v)) => item.system_info = v,
                ("info", FieldValue::String(v)) => item.info = v,
                ("std_cout", FieldValue::String(v)) => item.std_cout = v,
                ("std_cerr", FieldValue::String(v)) => item.std_cerr = v,
                // Unknown name, or a known name with a type that doesn't
                // match: already consumed via its tag, just move on.
                _ => {}
            }
        }
        Ok(item)
    }
}

enum FieldValue {
    U64(u64),
    String(String),
}

fn write_u64_field(out: &mut Vec<u8>, name: &str, value: u64) {
    write_string(out, name);
    out.push(TAG_U64);
    write_u64(out, value);
}

fn write_string_field(out: &mut Vec<u8>, name: &str, value: &str) {
    write_string(out, name);
    out.push(TAG_STRING);
    write_string(out, value);
}

fn read_tagged_value(buf: &[u8], pos: &mut usize) -> Result<FieldValue> {
    anyhow::ensure!(*pos < buf.len(), "truncated buffer while reading a history field's type tag");
    let tag = buf[*pos];
    *pos += 1;
    match tag {
        TAG_U64 => Ok(FieldValue::U64(read_u64(buf, pos)?)),
        TAG_STRING => Ok(FieldValue::String(read_string(buf, pos)?)),
        other => bail!("unknown history field type tag {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HistoryItem {
        HistoryItem {
            open_time: 1_700_000_000,
            close_time: 1_700_000_042,
            mem_peak_bytes: 123_456,
            command_line: "kmerdb build --k 31".to_string(),
            info: "test run".to_string(),
            system_info: "linux x86_64, 8 cores".to_string(),
            std_cout: "progress: 100%".to_string(),
            std_cerr: String::new(),
        }
    }

    #[test]
    fn round_trips() {
        let item = sample();
        let bytes = item.serialize();
        let loaded = HistoryItem::load(&bytes).unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn unknown_field_is_skipped_without_desyncing() {
        let item = sample();
        let mut bytes = Vec::new();
        write_string(&mut bytes, "future_field");
        bytes.push(TAG_STRING);
        write_string(&mut bytes, "some value from a newer writer");
        bytes.extend(item.serialize());

        let loaded = HistoryItem::load(&bytes).unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn unknown_u64_field_is_also_skipped() {
        let item = sample();
        let mut bytes = Vec::new();
        write_string(&mut bytes, "hardware_concurrency");
        bytes.push(TAG_U64);
        write_u64(&mut bytes, 16);
        bytes.extend(item.serialize());

        let loaded = HistoryItem::load(&bytes).unwrap();
        assert_eq!(loaded, item);
    }
}
