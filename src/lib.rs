extern crate byteorder;
extern crate encoding;
extern crate itertools;
#[macro_use] extern crate lazy_static;
extern crate log;
extern crate regex;
extern crate thiserror;

pub mod geo;
pub mod read;

pub use geo::Geometry;
pub use read::shapefile::{open, ShapefileError, ShapefileSession};
