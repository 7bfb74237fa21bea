/// Reads the header and field catalog of an xbase ".dbf" file, as per
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html
///
/// Record values aren't decoded; a shapefile session only needs to know the
/// table is there, how many rows it claims and what its columns are.
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use byteorder::{ByteOrder, LittleEndian};
use encoding::{DecoderTrap, EncodingRef};

use super::error::{Result, ShapefileError};

const DBF_HEADER_LENGTH: usize = 32;
const DBF_FIELD_DESCRIPTOR_LENGTH: usize = 32;
const DBF_FIELD_TERMINATOR: u8 = 0x0d;
const DBF_FIELD_NAME_LENGTH: usize = 11;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DbfType {
    Char,
    Numeric,
    Float,
    Logical,
    Date,
    Memo,
    Long,
    Double,
    Unsupported(u8),
}

impl DbfType {
    fn with_u8(u: u8) -> DbfType {
        match u {
            b'C' => DbfType::Char,
            b'N' => DbfType::Numeric,
            b'F' => DbfType::Float,
            b'L' => DbfType::Logical,
            b'D' => DbfType::Date,
            b'M' => DbfType::Memo,
            b'I' => DbfType::Long,
            b'O' => DbfType::Double,
            _ => DbfType::Unsupported(u),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: String,
    pub data_type: DbfType,
    /// Byte offset within a record, counting the leading deletion flag.
    pub offset: u16,
    pub len: u8,
    pub decimal_count: u8,
}

/// The fixed part of the header, plus the field catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfTable {
    pub version: u8,
    /// (year, month, day). The year is stored as an offset from 1900.
    pub last_updated: (u16, u8, u8),
    pub n_records: usize,
    pub n_header_bytes: usize,
    pub n_bytes_per_record: usize,
    pub fields: Box<[DbfField]>,
}

impl DbfTable {
    pub fn get_field(&self, name: &str) -> Option<&DbfField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for DbfTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (y, m, d) = self.last_updated;
        writeln!(f, "Records: {}", self.n_records)?;
        writeln!(f, "Bytes in the Header: {}", self.n_header_bytes)?;
        writeln!(f, "Bytes in the Record: {}", self.n_bytes_per_record)?;
        write!(f, "Last Updated: {}-{:02}-{:02}", y, m, d)?;
        for field in self.fields.iter() {
            write!(f, "\nField {}: {:?}({}.{})", field.name, field.data_type, field.len, field.decimal_count)?;
        }
        Ok(())
    }
}

/// Decodes the 32-byte header and the field descriptors after it.
///
/// Fails with `InvalidTable` for an impossible date or header length.
pub fn parse_table(buf: &[u8], encoding: EncodingRef) -> Result<DbfTable> {
    if buf.len() < DBF_HEADER_LENGTH {
        return Err(ShapefileError::InvalidTable(format!("header needs {} bytes, but only {} are available", DBF_HEADER_LENGTH, buf.len())));
    }

    // Virtually any 32 bytes make a valid header. The exception: bytes 1-3
    // are a YMD date, and there are only 12 months and 31 days.
    if buf[2] > 12 || buf[3] > 31 {
        return Err(ShapefileError::InvalidTable(String::from("The first four bytes of the file mention an invalid creation date. This is not a valid .dbf file.")));
    }

    let n_header_bytes = LittleEndian::read_u16(&buf[8..10]) as usize;
    if n_header_bytes < DBF_HEADER_LENGTH + 1 {
        return Err(ShapefileError::InvalidTable(format!("header length {} is too short", n_header_bytes)));
    }
    if buf.len() < n_header_bytes {
        return Err(ShapefileError::InvalidTable(format!("header says it is {} bytes, but only {} are available", n_header_bytes, buf.len())));
    }

    let fields = parse_fields(&buf[DBF_HEADER_LENGTH .. n_header_bytes], encoding)?;

    Ok(DbfTable {
        version: buf[0],
        last_updated: (1900 + buf[1] as u16, buf[2], buf[3]),
        n_records: LittleEndian::read_u32(&buf[4..8]) as usize,
        n_header_bytes: n_header_bytes,
        n_bytes_per_record: LittleEndian::read_u16(&buf[10..12]) as usize,
        fields: fields,
    })
}

/// Reads descriptors until the 0x0D terminator (or the end of the header).
fn parse_fields(buf: &[u8], encoding: EncodingRef) -> Result<Box<[DbfField]>> {
    let mut fields = Vec::<DbfField>::new();
    let mut offset: u16 = 1; // after the deletion flag

    for chunk in buf.chunks(DBF_FIELD_DESCRIPTOR_LENGTH) {
        if chunk[0] == DBF_FIELD_TERMINATOR || chunk.len() < DBF_FIELD_DESCRIPTOR_LENGTH {
            break;
        }

        let name_bytes = &chunk[.. DBF_FIELD_NAME_LENGTH];
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(DBF_FIELD_NAME_LENGTH);
        let name = encoding.decode(&name_bytes[.. name_len], DecoderTrap::Replace)
            .map_err(|err| ShapefileError::InvalidTable(format!("undecodable field name: {}", err)))?;

        let len = chunk[16];
        fields.push(DbfField {
            name: name.trim().to_string(),
            data_type: DbfType::with_u8(chunk[11]),
            offset: offset,
            len: len,
            decimal_count: chunk[17],
        });
        offset = offset.saturating_add(len as u16);
    }

    Ok(fields.into_boxed_slice())
}

/// Reads the table header from the start of a ".dbf" stream.
///
/// Side-effect: advances the stream to the first data record.
pub fn read_table(file: &mut dyn Read, encoding: EncodingRef) -> Result<DbfTable> {
    let mut buf = [ 0u8; DBF_HEADER_LENGTH ];
    file.read_exact(&mut buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => ShapefileError::InvalidTable(String::from("file is shorter than a .dbf header")),
        _ => ShapefileError::Io(err),
    })?;

    let n_header_bytes = LittleEndian::read_u16(&buf[8..10]) as usize;
    let mut header = buf.to_vec();
    if n_header_bytes > DBF_HEADER_LENGTH {
        header.resize(n_header_bytes, 0);
        file.read_exact(&mut header[DBF_HEADER_LENGTH ..]).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => ShapefileError::InvalidTable(format!("header says it is {} bytes, but the file is shorter", n_header_bytes)),
            _ => ShapefileError::Io(err),
        })?;
    }

    parse_table(&header, encoding)
}

pub fn open(path: &Path, encoding: EncodingRef) -> Result<DbfTable> {
    let f = fs::File::open(path)?;
    read_table(&mut io::BufReader::new(f), encoding)
}
