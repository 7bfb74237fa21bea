//! Everything that can go wrong while decoding a shapefile.
//!
//! Open-time problems (`MissingComponents`, `NotAShapefile`, `HeaderTooShort`,
//! `UnknownShapeType`) mean there is no usable session. Per-record problems
//! (`TruncatedData`, `InsufficientBuffer`, `MalformedRecord`,
//! `UnsupportedShapeType`) spoil one record; the caller decides whether to
//! keep iterating.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::shp::ShapeType;

#[derive(Debug, Error)]
pub enum ShapefileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The ".shp", ".shx" and ".dbf" triplet is incomplete.
    #[error("Missing shapefile components at {}: {}", .base.display(), .missing.join(", "))]
    MissingComponents {
        base: PathBuf,
        missing: Vec<&'static str>,
    },

    /// The first four bytes aren't the big-endian file code 9994.
    #[error("Not a shapefile: found file code {file_code}, expected 9994")]
    NotAShapefile { file_code: i32 },

    #[error("Shapefile header needs 100 bytes, but only {len} are available")]
    HeaderTooShort { len: usize },

    #[error("Nonexistent shape type {0}")]
    UnknownShapeType(i32),

    /// A real shape type whose payload we don't decode (Z, M, MultiPatch).
    #[error("Unsupported shape type {0}")]
    UnsupportedShapeType(ShapeType),

    /// A read ran past the end of the available bytes.
    #[error("Truncated data: needed {needed} bytes at offset {offset}, but only {available} remain")]
    TruncatedData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A record is too short to hold even the smallest shape of its type.
    #[error("{shape_type} record needs at least {needed} bytes, but has {len}")]
    InsufficientBuffer {
        shape_type: ShapeType,
        len: usize,
        needed: usize,
    },

    /// A record's framing or counts contradict each other.
    #[error("Record number {record_number} is malformed: {reason}")]
    MalformedRecord { record_number: i32, reason: String },

    /// The ".dbf" header makes no sense.
    #[error("Invalid attribute table: {0}")]
    InvalidTable(String),

    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("A reader is already open for {}", .0.display())]
    AlreadyOpen(PathBuf),
}

impl ShapefileError {
    /// True for errors that spoil a single record but leave the session
    /// positioned at the next one.
    pub fn is_record_error(&self) -> bool {
        match self {
            &ShapefileError::TruncatedData { .. }
            | &ShapefileError::InsufficientBuffer { .. }
            | &ShapefileError::MalformedRecord { .. }
            | &ShapefileError::UnsupportedShapeType(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = ::std::result::Result<T, ShapefileError>;
