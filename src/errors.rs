//! Error types shared across the crate.
//!
//! The taxonomy distinguishes errors a caller is expected to recover from
//! programmatically ([`FormatError::MissingMetadata`]) from errors that mark
//! a broken file ([`FormatError::DataFileBroken`],
//! [`FormatError::FormatMetadata`]) and from plain integration mistakes
//! ([`MetaDataError::UnknownKey`]).

/// Errors raised by the metadata model.
#[derive(Debug, thiserror::Error)]
pub enum MetaDataError {
    /// A key outside the fixed metadata schema was used.
    #[error("unknown metadata key '{0}'")]
    UnknownKey(String),

    /// A recognized key was read but never set and cannot be derived.
    ///
    /// This is recoverable: the caller may supply the key via
    /// `meta_override` and retry the load.
    #[error("no metadata was defined for '{key}'; pass it via `meta_override` when loading")]
    NotProvided {
        /// The key that was requested.
        key: String,
    },

    /// A value did not pass the key's validator/coercion function.
    #[error("invalid value for metadata key '{key}': {reason}")]
    InvalidValue {
        /// The key that was being set.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// An imaging modality without a segment-count mapping was set.
    #[error("unsupported imaging modality '{0}'; please extend the segment-count mapping")]
    UnsupportedModality(String),

    /// A deferred metadata computation failed on first read.
    #[error("deferred metadata computation failed: {0}")]
    LazyFailed(String),
}

/// Errors raised while loading or exporting data files.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON parsing error (tab-format metadata blocks).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file suffix/content does not match any registered format.
    ///
    /// Directory-walking callers treat this as "skip the file".
    #[error("unsupported file format: {0}")]
    NotSupported(String),

    /// The file is structurally unreadable (malformed properties, truncated
    /// channel data, bad table rows).
    #[error("invalid or broken data file: {0}")]
    DataFileBroken(String),

    /// The archive is readable but a required property or conversion-chain
    /// step is absent or malformed.
    #[error("file format metadata error: {0}")]
    FormatMetadata(String),

    /// Specific metadata keys could not be derived from the file.
    ///
    /// Recoverable: retry the identical call with the named keys supplied
    /// via `meta_override`.
    #[error("missing metadata keys {keys:?}; supply them via `meta_override` and retry")]
    MissingMetadata {
        /// The keys that could not be derived.
        keys: Vec<String>,
    },

    /// The requested curve or segment index does not exist in the archive.
    ///
    /// Distinct from format errors: the archive itself is valid.
    #[error("curve or segment index not found: {0}")]
    Index(String),

    /// No archive member matched any known alias for a column.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A column assignment did not match the curve length.
    #[error("cannot set column of length {actual} on a curve of length {expected}")]
    LengthMismatch {
        /// The curve length.
        expected: usize,
        /// The length of the rejected assignment.
        actual: usize,
    },

    /// A declared encoding or layout is not supported by this reader.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Metadata model error.
    #[error(transparent)]
    MetaData(#[from] MetaDataError),
}

impl FormatError {
    /// Shorthand for a [`FormatError::FormatMetadata`] about a missing
    /// property key.
    pub(crate) fn missing_property(key: &str) -> Self {
        FormatError::FormatMetadata(format!("required property '{key}' not found"))
    }
}
