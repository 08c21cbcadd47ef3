use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures turning a markdown file into a [`crate::post::Post`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Post is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Malformed front-matter: {0}")]
    MalformedFrontMatter(String),

    #[error("Missing front-matter field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date for {field}: {reason}")]
    InvalidDate { field: &'static str, reason: String },

    #[error("Title produces an empty slug")]
    EmptySlug,

    #[error("Error rendering markdown: {0}")]
    Render(String),

    #[error("{file}: {source}")]
    InFile {
        file: PathBuf,
        #[source]
        source: Box<ParseError>,
    },

    #[error("Slug {slug} is used by both {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl ParseError {
    pub(crate) fn in_file(self, file: impl Into<PathBuf>) -> ParseError {
        ParseError::InFile {
            file: file.into(),
            source: Box::new(self),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Error opening store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No post with hash {0}")]
    NotFound(String),

    #[error("Raw payload missing for hash {0}")]
    MissingRaw(String),

    #[error("Slug already taken in the store: {0}")]
    SlugTaken(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Input closed before an answer was given")]
    Aborted,

    #[error("Prompt I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
