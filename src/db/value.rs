//! Per-k-mer value tuples. Each sample stores one scalar per k-mer, and
//! the scalar's on-disk width and numeric type are declared once in the
//! database's metadata (component C8) rather than fixed at compile time,
//! so a schema here is a small runtime-described `Vec<ValueField>`
//! mirroring the original's `std::variant`-driven `IterateValues`.

use anyhow::{bail, Result};
use smallvec::SmallVec;

use super::error::DbError;

/// One sample's declared scalar type and on-disk width in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueField {
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ValueField {
    pub fn num_bytes(self) -> usize {
        match self {
            ValueField::U8 => 1,
            ValueField::U16 => 2,
            ValueField::U32 => 4,
            ValueField::U64 => 8,
            ValueField::F32 => 4,
            ValueField::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueField::U8 => "Uint8",
            ValueField::U16 => "Uint16",
            ValueField::U32 => "Uint32",
            ValueField::U64 => "Uint64",
            ValueField::F32 => "Float",
            ValueField::F64 => "Double",
        }
    }

    pub fn from_name(name: &str) -> Result<ValueField> {
        Ok(match name {
            "Uint8" => ValueField::U8,
            "Uint16" => ValueField::U16,
            "Uint32" => ValueField::U32,
            "Uint64" => ValueField::U64,
            "Float" => ValueField::F32,
            "Double" => ValueField::F64,
            other => bail!("unknown value type name {other:?}"),
        })
    }
}

/// A decoded scalar, tagged with the field it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueScalar {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ValueScalar {
    /// Best-effort widening to `f64`, used by callers that just want a
    /// number regardless of the declared storage type.
    pub fn as_f64(self) -> f64 {
        match self {
            ValueScalar::U8(v) => v as f64,
            ValueScalar::U16(v) => v as f64,
            ValueScalar::U32(v) => v as f64,
            ValueScalar::U64(v) => v as f64,
            ValueScalar::F32(v) => v as f64,
            ValueScalar::F64(v) => v,
        }
    }
}

/// One decoded sample row: one [`ValueScalar`] per field in a
/// [`ValueSchema`], inline up to 4 samples before spilling to the heap.
pub type ValueRow = SmallVec<[ValueScalar; 4]>;

/// The tuple of per-sample scalar types declared for a database, in
/// sample order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueSchema(pub Vec<ValueField>);

impl ValueSchema {
    pub fn total_bytes(&self) -> usize {
        self.0.iter().map(|f| f.num_bytes()).sum()
    }

    pub fn num_samples(&self) -> usize {
        self.0.len()
    }

    /// Append an all-zero row (used by `SortedWithLUT`'s raw writer,
    /// which fills missing samples with zero before the indexing pass).
    pub fn write_zero_row(&self, out: &mut Vec<u8>) {
        for _ in 0..self.total_bytes() {
            out.push(0);
        }
    }

    pub fn write_row(&self, row: &[ValueScalar], out: &mut Vec<u8>) -> Result<()> {
        if row.len() != self.0.len() {
            return Err(DbError::SchemaMismatch {
                expected: format!("{} sample(s): {:?}", self.0.len(), self.0),
                found: format!("{} sample(s)", row.len()),
            }
            .into());
        }
        for (field, scalar) in self.0.iter().zip(row) {
            write_scalar(*field, *scalar, out)?;
        }
        Ok(())
    }

    pub fn read_row(&self, buf: &[u8]) -> Result<ValueRow> {
        if buf.len() != self.total_bytes() {
            return Err(DbError::SchemaMismatch {
                expected: format!("{} byte(s)", self.total_bytes()),
                found: format!("{} byte(s)", buf.len()),
            }
            .into());
        }
        let mut row = ValueRow::with_capacity(self.0.len());
        let mut pos = 0;
        for field in &self.0 {
            let width = field.num_bytes();
            row.push(read_scalar(*field, &buf[pos..pos + width]));
            pos += width;
        }
        Ok(row)
    }
}

fn write_scalar(field: ValueField, scalar: ValueScalar, out: &mut Vec<u8>) -> Result<()> {
    match (field, scalar) {
        (ValueField::U8, ValueScalar::U8(v)) => out.push(v),
        (ValueField::U16, ValueScalar::U16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueField::U32, ValueScalar::U32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueField::U64, ValueScalar::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueField::F32, ValueScalar::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueField::F64, ValueScalar::F64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        _ => bail!("value scalar does not match its declared field type"),
    }
    Ok(())
}

fn read_scalar(field: ValueField, buf: &[u8]) -> ValueScalar {
    match field {
        ValueField::U8 => ValueScalar::U8(buf[0]),
        ValueField::U16 => ValueScalar::U16(u16::from_le_bytes(buf.try_into().unwrap())),
        ValueField::U32 => ValueScalar::U32(u32::from_le_bytes(buf.try_into().unwrap())),
        ValueField::U64 => ValueScalar::U64(u64::from_le_bytes(buf.try_into().unwrap())),
        ValueField::F32 => ValueScalar::F32(f32::from_le_bytes(buf.try_into().unwrap())),
        ValueField::F64 => ValueScalar::F64(f64::from_le_bytes(buf.try_into().unwrap())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_schema() {
        let schema = ValueSchema(vec![ValueField::U32, ValueField::F64, ValueField::U8]);
        let row: ValueRow = SmallVec::from_vec(vec![
            ValueScalar::U32(42),
            ValueScalar::F64(3.5),
            ValueScalar::U8(9),
        ]);
        let mut buf = Vec::new();
        schema.write_row(&row, &mut buf).unwrap();
        assert_eq!(buf.len(), schema.total_bytes());

        let loaded = schema.read_row(&buf).unwrap();
        assert_eq!(loaded.as_slice(), row.as_slice());
    }

    #[test]
    fn zero_row_is_all_zero_bytes() {
        let schema = ValueSchema(vec![ValueField::U64, ValueField::F32]);
        let mut buf = Vec::new();
        schema.write_zero_row(&mut buf);
        assert_eq!(buf, vec![0u8; 12]);
    }

    #[test]
    fn write_row_with_wrong_field_count_is_a_schema_mismatch() {
        let schema = ValueSchema(vec![ValueField::U32, ValueField::U8]);
        let row: ValueRow = SmallVec::from_vec(vec![ValueScalar::U32(1)]);
        let err = schema.write_row(&row, &mut Vec::new()).unwrap_err();
        assert!(err.downcast_ref::<DbError>().is_some_and(|e| matches!(e, DbError::SchemaMismatch { .. })));
    }

    #[test]
    fn name_round_trips() {
        for field in [
            ValueField::U8,
            ValueField::U16,
            ValueField::U32,
            ValueField::U64,
            ValueField::F32,
            ValueField::F64,
        ] {
            assert_eq!(ValueField::from_name(field.name()).unwrap(), field);
        }
    }
}
