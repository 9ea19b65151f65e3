use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown catalog kind: {0} (expected halos or particles)")]
    UnknownCatalogKind(String),

    #[error("malformed catalog filename: {0}")]
    MalformedFilename(String),

    #[error("input filename does not match one of the default catalogs: {0}")]
    #[diagnostic(help("only the default halo and particle catalogs can be downloaded"))]
    NotADefaultCatalog(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("archive request failed: {0}")]
    ArchiveHttp(String),

    #[error("archive returned status {status}: {message}")]
    ArchiveStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("unreadable table: {0}")]
    TableFormat(String),
}
