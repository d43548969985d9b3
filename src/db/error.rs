use std::fmt;

/// Abstract failure kinds the database can report. Carried inside
/// `anyhow::Error` so callers that want to branch on the kind can
/// `downcast_ref::<DbError>()`; everyone else just propagates the
/// `anyhow::Result` and prints the `Display` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// An expected archive stream is absent (corrupt file, or wrong file).
    MissingStream { name: String },
    /// A stream that must carry exactly one part has more than one.
    UnexpectedExtraPart { name: String },
    /// A required single-part stream has no parts at all.
    EmptyStream { name: String },
    /// The file's major version does not match this library's.
    IncompatibleVersion {
        file_major: u64,
        library_major: u64,
    },
    /// The caller's declared value schema doesn't match the one in metadata.
    SchemaMismatch { expected: String, found: String },
    /// `add_kmer` was called with a k-mer not strictly greater than the
    /// previous one.
    OutOfOrderWrite,
    /// The underlying archive failed a read or write.
    ArchiveIoError(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::MissingStream { name } => write!(f, "missing stream {name:?}"),
            DbError::UnexpectedExtraPart { name } => {
                write!(f, "stream {name:?} expected exactly one part, found more")
            }
            DbError::EmptyStream { name } => write!(f, "stream {name:?} is unexpectedly empty"),
            DbError::IncompatibleVersion {
                file_major,
                library_major,
            } => write!(
                f,
                "incompatible database version: file is major {file_major}, library is major {library_major}"
            ),
            DbError::SchemaMismatch { expected, found } => write!(
                f,
                "value schema mismatch: database declares {found}, caller expects {expected}"
            ),
            DbError::OutOfOrderWrite => {
                write!(f, "k-mers must be added in strictly ascending, unique order")
            }
            DbError::ArchiveIoError(msg) => write!(f, "archive I/O error: {msg}"),
        }
    }
}

impl std::error::Error for DbError {}
