pub mod db;

pub use db::error::DbError;
pub use db::kmer::Kmer;
pub use db::metadata::{Config, ConfigSortedPlain, ConfigSortedWithLUT, KmersRepresentation};
pub use db::reader::DatabaseReader;
pub use db::value::{ValueField, ValueRow, ValueScalar, ValueSchema};
pub use db::writer::DatabaseWriter;
