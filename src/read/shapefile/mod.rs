//! Reads ".shp" files, with their ".shx" index and ".dbf" attribute table.
//!
//! There are two pieces of information this module _doesn't_ read:
//!
//! * The _projection_. Sometimes there's a ".prj" file that contains it, but
//!   no file format can represent all the projections out there in the
//!   world. `ShapefileSession::open_component("prj")` hands you the file;
//!   points come out as `f64` pairs.
//! * Attribute _values_. The ".dbf" header and field catalog are read, so
//!   you can see which columns exist, but rows aren't decoded.
//!
//! Z, M and MultiPatch payloads are recognized but not decoded: those records
//! fail with `ShapefileError::UnsupportedShapeType`.
//!
//! # Examples
//!
//! Open by ".shp" filename (or ".shx", or ".dbf", or the base path):
//!
//! ```no_run
//! use std::path::Path;
//! use shpreader::read::shapefile;
//!
//! let session = shapefile::open(Path::new("parcels.shp")).unwrap();
//!
//! for geometry in session {
//!     // geometry is a Result<Geometry, ShapefileError>
//!     println!("{}", geometry.unwrap());
//! }
//! ```
//!
//! Read a broken file as far as possible:
//!
//! ```no_run
//! use std::path::Path;
//! use shpreader::read::shapefile::{self, ReadOptions, RecordErrorPolicy};
//!
//! let options = ReadOptions::new()
//!     .use_index(false)
//!     .record_errors(RecordErrorPolicy::Skip);
//! let session = shapefile::open_with(Path::new("parcels.shp"), options).unwrap();
//!
//! println!("Read {} geometries", session.filter_map(|g| g.ok()).count());
//! ```
//!
//! List the shapefiles in a directory:
//!
//! ```no_run
//! use std::path::Path;
//! use shpreader::read::shapefile;
//!
//! for (path, header) in shapefile::headers_in_directory(Path::new("data")).unwrap() {
//!     println!("{}: {}", path.display(), header.shape_type);
//! }
//! ```

pub mod components;
pub mod cursor;
pub mod dbf;
pub mod error;
pub mod geometry;
pub mod options;
pub mod registry;
pub mod shapefile;
pub mod shp;
pub mod shx;

#[cfg(test)]
mod fixtures;

pub use self::components::{has_components, headers_in_directory, locate, ComponentPaths};
pub use self::dbf::{DbfField, DbfTable, DbfType};
pub use self::error::{Result, ShapefileError};
pub use self::options::{ReadOptions, RecordErrorPolicy};
pub use self::registry::ReaderRegistry;
pub use self::shapefile::{open, open_with, SessionState, ShapefileSession};
pub use self::shp::{RawRecord, ShapeType, ShpBoundingBox, ShpHeader};
pub use self::shx::IndexRecord;
