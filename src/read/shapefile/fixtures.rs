//! Builds shapefile bytes for tests.

use std::fs;
use std::path::{Path, PathBuf};
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub fn header(shape_type: i32, file_length: i32, bbox: [f64; 8]) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::with_capacity(100);
    buf.write_i32::<BigEndian>(9994).unwrap();
    for _ in 0 .. 5 {
        buf.write_i32::<BigEndian>(0).unwrap();
    }
    buf.write_i32::<BigEndian>(file_length).unwrap();
    buf.write_i32::<LittleEndian>(1000).unwrap();
    buf.write_i32::<LittleEndian>(shape_type).unwrap();
    for &v in bbox.iter() {
        buf.write_f64::<LittleEndian>(v).unwrap();
    }
    buf
}

fn write_points(buf: &mut Vec<u8>, points: &[(f64, f64)]) {
    for &(x, y) in points {
        buf.write_f64::<LittleEndian>(x).unwrap();
        buf.write_f64::<LittleEndian>(y).unwrap();
    }
}

fn write_bbox(buf: &mut Vec<u8>, points: &[(f64, f64)]) {
    let xs = points.iter().map(|p| p.0);
    let ys = points.iter().map(|p| p.1);
    buf.write_f64::<LittleEndian>(xs.clone().fold(0. / 0., f64::min)).unwrap();
    buf.write_f64::<LittleEndian>(ys.clone().fold(0. / 0., f64::min)).unwrap();
    buf.write_f64::<LittleEndian>(xs.fold(0. / 0., f64::max)).unwrap();
    buf.write_f64::<LittleEndian>(ys.fold(0. / 0., f64::max)).unwrap();
}

pub fn null_content() -> Vec<u8> {
    vec![ 0, 0, 0, 0 ]
}

pub fn point_content(x: f64, y: f64) -> Vec<u8> {
    let mut buf: Vec<u8> = vec![];
    buf.write_i32::<LittleEndian>(1).unwrap();
    write_points(&mut buf, &[ (x, y) ]);
    buf
}

pub fn multipoint_content(points: &[(f64, f64)]) -> Vec<u8> {
    let mut buf: Vec<u8> = vec![];
    buf.write_i32::<LittleEndian>(8).unwrap();
    write_bbox(&mut buf, points);
    buf.write_i32::<LittleEndian>(points.len() as i32).unwrap();
    write_points(&mut buf, points);
    buf
}

pub fn poly_content(shape_type: i32, part_starts: &[i32], points: &[(f64, f64)]) -> Vec<u8> {
    let mut buf: Vec<u8> = vec![];
    buf.write_i32::<LittleEndian>(shape_type).unwrap();
    write_bbox(&mut buf, points);
    buf.write_i32::<LittleEndian>(part_starts.len() as i32).unwrap();
    buf.write_i32::<LittleEndian>(points.len() as i32).unwrap();
    for &start in part_starts {
        buf.write_i32::<LittleEndian>(start).unwrap();
    }
    write_points(&mut buf, points);
    buf
}

/// A ".shp" and its ".shx".
pub struct Fixture {
    pub shp: Vec<u8>,
    pub shx: Vec<u8>,
    pub n_records: usize,
}

pub fn build(shape_type: i32, contents: &[Vec<u8>]) -> Fixture {
    let mut records: Vec<u8> = vec![];
    let mut index: Vec<u8> = vec![];
    let mut offset = 50;

    for (i, content) in contents.iter().enumerate() {
        let length = (content.len() / 2) as i32;
        index.write_i32::<BigEndian>(offset).unwrap();
        index.write_i32::<BigEndian>(length).unwrap();
        records.write_i32::<BigEndian>(i as i32 + 1).unwrap();
        records.write_i32::<BigEndian>(length).unwrap();
        records.extend_from_slice(content);
        offset += 4 + length;
    }

    let bbox = [ 0., 0., 10., 10., 0., 0., 0., 0. ];
    let mut shp = header(shape_type, ((100 + records.len()) / 2) as i32, bbox);
    shp.extend(records);
    let mut shx = header(shape_type, ((100 + index.len()) / 2) as i32, bbox);
    shx.extend(index);

    Fixture {
        shp: shp,
        shx: shx,
        n_records: contents.len(),
    }
}

/// A ".dbf" with one 10-character field and `n_records` blank records.
pub fn dbf(n_records: usize) -> Vec<u8> {
    dbf_with_fields(n_records, &[ ("NAME", b'C', 10, 0) ])
}

pub fn dbf_with_fields(n_records: usize, fields: &[(&str, u8, u8, u8)]) -> Vec<u8> {
    let n_header_bytes = 32 + 32 * fields.len() + 1;
    let n_bytes_per_record = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();

    let mut buf: Vec<u8> = vec![ 0x03, 124, 6, 15 ];
    buf.write_u32::<LittleEndian>(n_records as u32).unwrap();
    buf.write_u16::<LittleEndian>(n_header_bytes as u16).unwrap();
    buf.write_u16::<LittleEndian>(n_bytes_per_record as u16).unwrap();
    buf.extend_from_slice(&[ 0u8; 20 ]);

    for &(name, data_type, len, decimal_count) in fields {
        let mut name_bytes = [ 0u8; 11 ];
        name_bytes[.. name.len()].copy_from_slice(name.as_bytes());
        buf.extend_from_slice(&name_bytes);
        buf.push(data_type);
        buf.extend_from_slice(&[ 0u8; 4 ]);
        buf.push(len);
        buf.push(decimal_count);
        buf.extend_from_slice(&[ 0u8; 14 ]);
    }
    buf.push(0x0d);

    for _ in 0 .. n_records {
        buf.extend(vec![ b' '; n_bytes_per_record ]);
    }
    buf.push(0x1a);
    buf
}

/// Writes `<dir>/<stem>.shp`, `.shx` and `.dbf`; returns the ".shp" path.
pub fn write(dir: &Path, stem: &str, fixture: &Fixture) -> PathBuf {
    let base = dir.join(stem);
    fs::write(base.with_extension("shp"), &fixture.shp).unwrap();
    fs::write(base.with_extension("shx"), &fixture.shx).unwrap();
    fs::write(base.with_extension("dbf"), dbf(fixture.n_records)).unwrap();
    base.with_extension("shp")
}
