use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("no codes for year {year} and type {book_type} found in {}", path.display())]
    NoCodesFound {
        path: PathBuf,
        year: u16,
        book_type: char,
    },

    #[error("code {0} already exists")]
    DuplicateManualCode(String),

    #[error("code {code} does not match {expected}")]
    MalformedManualCode { code: String, expected: String },

    #[error("page {page_index} is out of range for code {code} (document has {page_count} pages)")]
    ManualPageOutOfRange {
        code: String,
        page_index: usize,
        page_count: usize,
    },

    #[error("page {page_index} is already claimed by manual code {existing}, cannot anchor {code}")]
    ManualPageConflict {
        code: String,
        existing: String,
        page_index: usize,
    },

    #[error("source {} changed since the session was created", path.display())]
    SourceChanged { path: PathBuf },

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("failed to load PDF {}", path.display())]
    LoadPdf {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("failed to write segment {code} to {}", path.display())]
    WriteSegment {
        code: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O failure at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
