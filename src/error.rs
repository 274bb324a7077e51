//! Error types returned by `esedb` operations.

use thiserror::Error;

/// Errors returned by `esedb` operations.
#[derive(Error, Debug)]
pub enum EseError {
    /// An I/O error occurred (file open, read, or seek failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// The database header or a page failed basic structural validation.
    #[error("invalid database: {0}")]
    InvalidDatabase(String),

    /// A page number was below 1 or past the end of the backing source.
    #[error("page out of range: {0}")]
    PageOutOfRange(String),

    /// A tag or node index fell outside the bounds of a page.
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// An exact key search found no matching node.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A cursor step moved past the first or last sibling page in a tree.
    #[error("no neighbour page: {0}")]
    NoNeighbourPage(String),

    /// The XPRESS9 or XPRESS10 compression scheme was encountered.
    #[error("unsupported compression scheme: {0}")]
    UnsupportedCompression(String),

    /// The sort-key mapper encountered a script class it does not implement.
    #[error("unsupported character for sort-key mapping: {0}")]
    UnsupportedCharacter(String),

    /// Tagged fields were encountered on a page predating `NewRecordFormat`.
    #[error("old record format: {0}")]
    OldRecordFormat(String),

    /// A long value was referenced but the owning table has no long-value tree.
    #[error("missing long value tree: {0}")]
    MissingLongValue(String),

    /// No table exists with the requested name.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// No column exists with the requested name on a table.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// No index exists with the requested name on a table.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// A byte slice was too short to decode the structure requested from it.
    #[error("malformed data: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, EseError>;
