//! Turns record content into `Geometry` values.
//!
//! Record content always starts with a little-endian shape-type tag. The
//! layout after it depends on the shape type the file header declares:
//!
//! * Point: x @4, y @12.
//! * MultiPoint: bounding box @4..36, `numPoints` @36, points from @40.
//! * PolyLine/Polygon: bounding box @4..36, `numParts` @36, `numPoints` @40,
//!   `numParts` part start indices from @44, then points.
//!
//! Per-record bounding boxes are skipped: they can be recomputed from the
//! points.

use std::iter;
use itertools::Itertools;

use super::cursor::{ByteCursor, POINT_LENGTH};
use super::error::{Result, ShapefileError};
use super::shp::{RawRecord, ShapeType};
use crate::geo::{Geometry, MultiPoint, Point, Polygon, Polyline};

const POINT_MIN_LENGTH: usize = 20;
const MULTIPOINT_MIN_LENGTH: usize = 56;
const POLY_MIN_LENGTH: usize = 60;
const NULL_RECORD_LENGTH: usize = 4;

const N_POINTS_OFFSET: usize = 36;
const N_PARTS_OFFSET: usize = 36;
const POLY_N_POINTS_OFFSET: usize = 40;
const MULTIPOINT_POINTS_OFFSET: usize = 40;
const PARTS_OFFSET: usize = 44;

/// Decodes one record's content, for a file of type `shape_type`.
///
/// Returns `Ok(None)` for Null shapes: either the whole file is Null, or this
/// record is a bare 4-byte Null tag.
pub fn decode(shape_type: ShapeType, content: &[u8]) -> Result<Option<Geometry>> {
    decode_numbered(shape_type, content, 0)
}

/// Decodes a record from the ".shp" reader, reporting its record number in
/// errors.
pub fn decode_record(shape_type: ShapeType, record: &RawRecord) -> Result<Option<Geometry>> {
    decode_numbered(shape_type, &record.content, record.record_number)
}

fn decode_numbered(shape_type: ShapeType, content: &[u8], record_number: i32) -> Result<Option<Geometry>> {
    if content.len() == NULL_RECORD_LENGTH && ByteCursor::new(content).read_i32_le()? == 0 {
        return Ok(None);
    }

    match shape_type {
        ShapeType::Null => Ok(None),
        ShapeType::Point => parse_point(content).map(|p| Some(Geometry::Point(p))),
        ShapeType::MultiPoint => parse_multipoint(content, record_number).map(|mp| Some(Geometry::MultiPoint(mp))),
        ShapeType::PolyLine => parse_parts(shape_type, content, record_number).map(|parts| Some(Geometry::Polyline(Polyline::new(parts)))),
        ShapeType::Polygon => parse_parts(shape_type, content, record_number).map(|parts| Some(Geometry::Polygon(Polygon::new(parts)))),
        ShapeType::PointZ
        | ShapeType::PolyLineZ
        | ShapeType::PolygonZ
        | ShapeType::MultiPointZ
        | ShapeType::PointM
        | ShapeType::PolyLineM
        | ShapeType::PolygonM
        | ShapeType::MultiPointM
        | ShapeType::MultiPatch => Err(ShapefileError::UnsupportedShapeType(shape_type)),
    }
}

fn require_length(shape_type: ShapeType, content: &[u8], needed: usize) -> Result<()> {
    if content.len() < needed {
        Err(ShapefileError::InsufficientBuffer {
            shape_type: shape_type,
            len: content.len(),
            needed: needed,
        })
    } else {
        Ok(())
    }
}

fn read_count(cursor: &ByteCursor, offset: usize, what: &str, record_number: i32) -> Result<usize> {
    let n = cursor.read_i32_le_at(offset)?;
    if n < 0 {
        return Err(ShapefileError::MalformedRecord {
            record_number: record_number,
            reason: format!("negative {} {}", what, n),
        });
    }
    Ok(n as usize)
}

/// Reads `n_points` consecutive (x, y) pairs starting at `offset`.
///
/// Fails with `TruncatedData` before allocating if the content can't hold
/// them all.
fn read_points(content: &[u8], offset: usize, n_points: usize) -> Result<Vec<Point>> {
    let mut cursor = ByteCursor::at(content, offset);
    let needed = n_points.checked_mul(POINT_LENGTH).unwrap_or(usize::max_value());
    if needed > cursor.remaining() {
        return Err(ShapefileError::TruncatedData {
            offset: offset,
            needed: needed,
            available: cursor.remaining(),
        });
    }

    let mut points = Vec::with_capacity(n_points);
    for _ in 0 .. n_points {
        points.push(cursor.read_point()?);
    }
    Ok(points)
}

fn parse_point(content: &[u8]) -> Result<Point> {
    require_length(ShapeType::Point, content, POINT_MIN_LENGTH)?;
    ByteCursor::at(content, 4).read_point()
}

fn parse_multipoint(content: &[u8], record_number: i32) -> Result<MultiPoint> {
    require_length(ShapeType::MultiPoint, content, MULTIPOINT_MIN_LENGTH)?;
    let cursor = ByteCursor::new(content);
    let n_points = read_count(&cursor, N_POINTS_OFFSET, "point count", record_number)?;
    let points = read_points(content, MULTIPOINT_POINTS_OFFSET, n_points)?;
    Ok(MultiPoint::from(points))
}

/// Decodes a PolyLine or Polygon into its parts.
fn parse_parts(shape_type: ShapeType, content: &[u8], record_number: i32) -> Result<Vec<MultiPoint>> {
    require_length(shape_type, content, POLY_MIN_LENGTH)?;
    let mut cursor = ByteCursor::new(content);
    let n_parts = read_count(&cursor, N_PARTS_OFFSET, "part count", record_number)?;
    let n_points = read_count(&cursor, POLY_N_POINTS_OFFSET, "point count", record_number)?;

    let needed = n_parts.checked_mul(4).unwrap_or(usize::max_value());
    cursor.seek(PARTS_OFFSET);
    if needed > cursor.remaining() {
        return Err(ShapefileError::TruncatedData {
            offset: PARTS_OFFSET,
            needed: needed,
            available: cursor.remaining(),
        });
    }
    let mut part_starts = Vec::with_capacity(n_parts);
    for _ in 0 .. n_parts {
        part_starts.push(cursor.read_i32_le()?);
    }

    let points = read_points(content, cursor.position(), n_points)?;
    split_parts(&part_starts, &points, record_number)
}

/// Splits a flat point array into parts.
///
/// Part `n` runs from `part_starts[n]` to `part_starts[n + 1]`; the last
/// part runs to the end of `points`. Each part is copied into its own
/// MultiPoint. A last part starting at `points.len()` comes out empty.
///
/// Starts must begin at 0, never decrease and never pass the end, so that
/// the parts concatenate back into `points`.
pub fn split_parts(part_starts: &[i32], points: &[Point], record_number: i32) -> Result<Vec<MultiPoint>> {
    let malformed = |reason: String| ShapefileError::MalformedRecord {
        record_number: record_number,
        reason: reason,
    };

    match part_starts.first() {
        None => return Err(malformed("no parts".to_string())),
        Some(&0) => {},
        Some(&start) => return Err(malformed(format!("first part starts at point {}, not 0", start))),
    }

    let n_points = points.len() as i64;
    let mut parts = Vec::with_capacity(part_starts.len());
    let bounds = part_starts.iter().map(|&s| s as i64).chain(iter::once(n_points));
    for (start, end) in bounds.tuple_windows() {
        if end < start || end > n_points {
            return Err(malformed(format!("part with points {}-{}, but there are {} points", start, end, n_points)));
        }

        parts.push(MultiPoint::from(points[start as usize .. end as usize].to_vec()));
    }

    Ok(parts)
}
