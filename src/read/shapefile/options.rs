use std::fmt;
use encoding::EncodingRef;

/// What a session does when one record fails to decode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordErrorPolicy {
    /// Hand the error to the caller; the next call reads the next record.
    Yield,
    /// Log the error and move on to the next record.
    Skip,
    /// Hand the error to the caller, then stop.
    Abort,
}

/// How to open a shapefile.
///
/// # Example
///
/// ```
/// use shpreader::read::shapefile::{ReadOptions, RecordErrorPolicy};
///
/// let options = ReadOptions::new()
///     .use_index(false)
///     .record_errors(RecordErrorPolicy::Skip)
///     .dbf_encoding(encoding::all::WINDOWS_1252);
///
/// assert!(!options.use_index);
/// ```
#[derive(Clone, Copy)]
pub struct ReadOptions {
    /// Read records through the ".shx". When false, read them sequentially.
    pub use_index: bool,
    pub record_errors: RecordErrorPolicy,
    /// Encoding of ".dbf" field names.
    pub dbf_encoding: EncodingRef,
    /// When true, a ".dbf" that doesn't parse fails `begin()`. When false
    /// (the default), it's logged and `table()` is `None`.
    pub require_table: bool,
}

impl ReadOptions {
    pub fn new() -> ReadOptions {
        ReadOptions::default()
    }

    pub fn use_index(mut self, use_index: bool) -> ReadOptions {
        self.use_index = use_index;
        self
    }

    pub fn record_errors(mut self, policy: RecordErrorPolicy) -> ReadOptions {
        self.record_errors = policy;
        self
    }

    pub fn dbf_encoding(mut self, encoding: EncodingRef) -> ReadOptions {
        self.dbf_encoding = encoding;
        self
    }

    pub fn require_table(mut self, require_table: bool) -> ReadOptions {
        self.require_table = require_table;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            use_index: true,
            record_errors: RecordErrorPolicy::Yield,
            dbf_encoding: encoding::all::ASCII,
            require_table: false,
        }
    }
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for ReadOptions {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ReadOptions")
            .field("use_index", &self.use_index)
            .field("record_errors", &self.record_errors)
            .field("dbf_encoding", &self.dbf_encoding.name())
            .field("require_table", &self.require_table)
            .finish()
    }
}
