use thiserror::Error;

/// Error taxonomy for the GenomicSQLite core (coordinate encoder, GRI
/// installer/compiler, reference catalog, connection opener).
///
/// Loader CLIs wrap these in `anyhow::Error` via `?` and add `.context(...)`
/// at call sites rather than matching on variants.
#[derive(Debug, Error)]
pub enum GenomicSqliteError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("coordinate out of range: {0}")]
    OutOfRange(String),

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("no genomic range index on table {0}")]
    NoIndex(String),

    #[error("schema conflict on table {table}: {detail}")]
    SchemaConflict { table: String, detail: String },

    #[error("schema drift on table {table}: {detail}")]
    SchemaDrift { table: String, detail: String },

    #[error(transparent)]
    HostEngineError(#[from] rusqlite::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GenomicSqliteError>;
