/// Reads ESRI ".shp" Shapefile headers and records, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
use std::fmt;
use std::fs;
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use log::trace;

use super::cursor::{read_up_to, ByteCursor};
use super::error::{Result, ShapefileError};
use super::shx::IndexRecord;

pub const SHP_HEADER_LENGTH: usize = 100;
pub const SHP_RECORD_HEADER_LENGTH: usize = 8;
pub const SHP_FILE_CODE: i32 = 9994;

/// Every shape type in version 1000 of the format, keyed by its on-disk code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    /// Fails with `UnknownShapeType` for codes the format doesn't define.
    /// Unknown codes never fall back to Null.
    pub fn from_code(code: i32) -> Result<ShapeType> {
        match code {
            0  => Ok(ShapeType::Null),
            1  => Ok(ShapeType::Point),
            3  => Ok(ShapeType::PolyLine),
            5  => Ok(ShapeType::Polygon),
            8  => Ok(ShapeType::MultiPoint),
            11 => Ok(ShapeType::PointZ),
            13 => Ok(ShapeType::PolyLineZ),
            15 => Ok(ShapeType::PolygonZ),
            18 => Ok(ShapeType::MultiPointZ),
            21 => Ok(ShapeType::PointM),
            23 => Ok(ShapeType::PolyLineM),
            25 => Ok(ShapeType::PolygonM),
            28 => Ok(ShapeType::MultiPointM),
            31 => Ok(ShapeType::MultiPatch),
            _ => Err(ShapefileError::UnknownShapeType(code)),
        }
    }

    pub fn code(&self) -> i32 {
        match *self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
            ShapeType::MultiPatch => 31,
        }
    }

}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The file-wide extent. Z and M ranges are zero in 2D files.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShpBoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub m_min: f64,
    pub m_max: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShpHeader {
    pub file_code: i32,
    /// Length of the whole file in 16-bit words, header included.
    pub file_length: i32,
    pub version: i32,
    pub shape_type: ShapeType,
    pub bounding_box: ShpBoundingBox,
}

impl ShpHeader {
    /// Decodes the first 100 bytes of a ".shp" (or ".shx") file.
    ///
    /// The file length at byte 24 is the one big-endian field we keep;
    /// everything after it is little-endian. The file code isn't checked
    /// here: see `check_file_code()`.
    pub fn parse(buf: &[u8]) -> Result<ShpHeader> {
        if buf.len() < SHP_HEADER_LENGTH {
            return Err(ShapefileError::HeaderTooShort { len: buf.len() });
        }

        let mut cursor = ByteCursor::new(buf);
        let file_code = cursor.read_i32_be()?;
        cursor.seek(24);
        let file_length = cursor.read_i32_be()?;
        let version = cursor.read_i32_le()?;
        let shape_type = ShapeType::from_code(cursor.read_i32_le()?)?;
        let bounding_box = ShpBoundingBox {
            x_min: cursor.read_f64_le()?,
            y_min: cursor.read_f64_le()?,
            x_max: cursor.read_f64_le()?,
            y_max: cursor.read_f64_le()?,
            z_min: cursor.read_f64_le()?,
            z_max: cursor.read_f64_le()?,
            m_min: cursor.read_f64_le()?,
            m_max: cursor.read_f64_le()?,
        };

        Ok(ShpHeader {
            file_code: file_code,
            file_length: file_length,
            version: version,
            shape_type: shape_type,
            bounding_box: bounding_box,
        })
    }

    /// The declared file length in bytes.
    pub fn file_n_bytes(&self) -> u64 {
        (self.file_length.max(0) as u64) * 2
    }
}

impl fmt::Display for ShpHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bbox = &self.bounding_box;
        writeln!(f, "Shapefile Type: {}", self.shape_type)?;
        writeln!(f, "Size: {} words ({} bytes)", self.file_length, self.file_n_bytes())?;
        writeln!(f, "Bounds: {} {} {} {}", bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max)?;
        write!(f, "Z & M Bounds: {} {} {} {}", bbox.z_min, bbox.z_max, bbox.m_min, bbox.m_max)
    }
}

/// Fails with `NotAShapefile` unless the buffer starts with big-endian 9994.
pub fn check_file_code(buf: &[u8]) -> Result<()> {
    let file_code = ByteCursor::new(buf).read_i32_be()
        .map_err(|_| ShapefileError::HeaderTooShort { len: buf.len() })?;
    if file_code == SHP_FILE_CODE {
        Ok(())
    } else {
        Err(ShapefileError::NotAShapefile { file_code: file_code })
    }
}

/// Reads the first 100 bytes of the stream and validates the file code.
///
/// Side-effect: advances the stream up to 100 bytes.
pub fn read_shp_header(file: &mut dyn Read) -> Result<ShpHeader> {
    let mut buf = [ 0u8; SHP_HEADER_LENGTH ];
    let n_read = read_up_to(file, &mut buf)?;
    let buf = &buf[.. n_read];

    check_file_code(buf)?;
    ShpHeader::parse(buf)
}

/// The big-endian (record number, content length) pair before each record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_number: i32,
    /// In 16-bit words.
    pub content_length: i32,
}

impl RecordHeader {
    pub fn parse(buf: &[u8]) -> Result<RecordHeader> {
        let mut cursor = ByteCursor::new(buf);
        Ok(RecordHeader {
            record_number: cursor.read_i32_be()?,
            content_length: cursor.read_i32_be()?,
        })
    }
}

/// One record's content, still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub record_number: i32,
    /// In 16-bit words.
    pub content_length: i32,
    pub content: Box<[u8]>,
}

impl RawRecord {
    /// Fails with `MalformedRecord` unless `content` holds exactly
    /// `content_length * 2` bytes.
    pub fn new(record_number: i32, content_length: i32, content: Vec<u8>) -> Result<RawRecord> {
        if content_length < 0 || content.len() as u64 != content_length as u64 * 2 {
            return Err(ShapefileError::MalformedRecord {
                record_number: record_number,
                reason: format!("header says {} words, but the content is {} bytes", content_length, content.len()),
            });
        }

        Ok(RawRecord {
            record_number: record_number,
            content_length: content_length,
            content: content.into_boxed_slice(),
        })
    }

    /// The shape-type tag each record starts with, if there is one.
    pub fn shape_tag(&self) -> Option<i32> {
        ByteCursor::new(&self.content).read_i32_le().ok()
    }
}

/// Reads ".shp" records one at a time.
///
/// With an index, record `n` is found by seeking to the offset in index
/// entry `n`. Without one, records are read back to back from byte 100,
/// trusting each record header's length.
///
/// The reader owns its stream position: don't share one between threads
/// without wrapping it in a lock.
///
/// # Example
///
/// ```no_run
/// use std::fs;
/// use std::io;
/// use shpreader::read::shapefile::shp::ShpRecordReader;
///
/// let r = io::BufReader::new(fs::File::open("parcels.shp").unwrap());
///
/// // No index: read records sequentially
/// let reader = ShpRecordReader::new(r, None).unwrap();
///
/// for record in reader {
///     // record is a Result<RawRecord, ShapefileError>
///     println!("{:?}", record.unwrap().record_number);
/// }
/// ```
#[derive(Debug)]
pub struct ShpRecordReader<R: Read + Seek> {
    file: R,
    header: ShpHeader,
    index: Option<Box<[IndexRecord]>>,
    n_records_read: usize,
    next_record_offset: u64,
    stream_position: Option<u64>,
    stream_len: u64,
    done: bool,
}

impl<R: Read + Seek> ShpRecordReader<R> {
    /// Reads the header from the start of `file`.
    ///
    /// An empty index counts as no index.
    pub fn new(mut file: R, index: Option<Vec<IndexRecord>>) -> Result<ShpRecordReader<R>> {
        file.seek(SeekFrom::Start(0))?;
        let header = read_shp_header(&mut file)?;
        ShpRecordReader::with_header(file, header, index)
    }

    /// Uses an already-decoded header. The stream position doesn't matter.
    ///
    /// Seeks to the end once to learn the stream length: no record content
    /// buffer is ever larger than what's left in the stream.
    pub fn with_header(mut file: R, header: ShpHeader, index: Option<Vec<IndexRecord>>) -> Result<ShpRecordReader<R>> {
        let stream_len = file.seek(SeekFrom::End(0))?;

        Ok(ShpRecordReader {
            file: file,
            header: header,
            index: index.filter(|i| !i.is_empty()).map(|i| i.into_boxed_slice()),
            n_records_read: 0,
            next_record_offset: SHP_HEADER_LENGTH as u64,
            stream_position: Some(stream_len),
            stream_len: stream_len,
            done: false,
        })
    }

    pub fn header(&self) -> &ShpHeader {
        &self.header
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<&[IndexRecord]> {
        self.index.as_ref().map(|i| &i[..])
    }

    /// How many records have been attempted so far (including failures).
    pub fn n_records_read(&self) -> usize {
        self.n_records_read
    }

    /// Reads the next record's content.
    ///
    /// Returns `Ok(None)` at the end of the records. In indexed mode a
    /// record that fails to decode doesn't stop the reader; in sequential
    /// mode any error does, because we can't tell where the next record
    /// starts.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        if self.done {
            return Ok(None);
        }

        let indexed = self.is_indexed();
        let result = if indexed {
            self.next_indexed_record()
        } else {
            self.next_sequential_record()
        };

        match result {
            Ok(None) => { self.done = true; }
            Err(ref err) if !indexed || !err.is_record_error() => { self.done = true; }
            _ => {}
        }

        result
    }

    fn seek_to(&mut self, position: u64) -> Result<()> {
        if self.stream_position != Some(position) {
            self.file.seek(SeekFrom::Start(position))?;
            self.stream_position = Some(position);
        }
        Ok(())
    }

    /// Fills `buf` from the current position. Returns false on a short read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let n_read = match read_up_to(&mut self.file, buf) {
            Ok(n) => n,
            Err(err) => {
                self.stream_position = None;
                return Err(ShapefileError::Io(err));
            }
        };
        self.stream_position = self.stream_position.map(|p| p + n_read as u64);
        Ok(n_read == buf.len())
    }

    fn next_indexed_record(&mut self) -> Result<Option<RawRecord>> {
        let entry = match self.index.as_ref().and_then(|i| i.get(self.n_records_read).cloned()) {
            None => return Ok(None),
            Some(entry) => entry,
        };
        self.n_records_read += 1;
        let record_number = self.n_records_read as i32;

        if entry.offset < 0 || entry.length < 0 {
            return Err(ShapefileError::MalformedRecord {
                record_number: record_number,
                reason: format!("index entry has offset {} and length {}", entry.offset, entry.length),
            });
        }

        self.seek_to(entry.record_offset())?;
        let mut header_buf = [ 0u8; SHP_RECORD_HEADER_LENGTH ];
        if !self.fill(&mut header_buf)? {
            return Ok(None);
        }
        let record_header = RecordHeader::parse(&header_buf)?;

        if record_header.content_length != entry.length {
            return Err(ShapefileError::MalformedRecord {
                record_number: record_header.record_number,
                reason: format!("index says {} words, but the record header says {}", entry.length, record_header.content_length),
            });
        }

        // A record that isn't all there is treated as end-of-data, never
        // handed out half-filled.
        if entry.content_offset() + entry.content_n_bytes() as u64 > self.stream_len {
            return Ok(None);
        }
        let mut content = vec![ 0u8; entry.content_n_bytes() ];
        if !self.fill(&mut content)? {
            return Ok(None);
        }

        trace!("Read record {} ({} bytes at {})", record_header.record_number, content.len(), entry.content_offset());
        RawRecord::new(record_header.record_number, entry.length, content).map(Some)
    }

    fn next_sequential_record(&mut self) -> Result<Option<RawRecord>> {
        let record_offset = self.next_record_offset;
        self.seek_to(record_offset)?;

        let mut header_buf = [ 0u8; SHP_RECORD_HEADER_LENGTH ];
        if !self.fill(&mut header_buf)? {
            return Ok(None);
        }
        let record_header = RecordHeader::parse(&header_buf)?;
        self.n_records_read += 1;

        if record_header.content_length < 0 {
            return Err(ShapefileError::MalformedRecord {
                record_number: record_header.record_number,
                reason: format!("negative content length {}", record_header.content_length),
            });
        }

        let content_offset = record_offset + SHP_RECORD_HEADER_LENGTH as u64;
        let content_n_bytes = record_header.content_length as u64 * 2;
        let record_end = content_offset + content_n_bytes;
        if record_end > self.header.file_n_bytes() {
            return Err(ShapefileError::MalformedRecord {
                record_number: record_header.record_number,
                reason: format!("record ends at byte {}, but the header says the file is {} bytes long", record_end, self.header.file_n_bytes()),
            });
        }

        if record_end > self.stream_len {
            return Err(ShapefileError::TruncatedData {
                offset: content_offset as usize,
                needed: content_n_bytes as usize,
                available: self.stream_len.saturating_sub(content_offset) as usize,
            });
        }

        let mut content = vec![ 0u8; content_n_bytes as usize ];
        let n_read = match read_up_to(&mut self.file, &mut content) {
            Ok(n) => n,
            Err(err) => {
                self.stream_position = None;
                return Err(ShapefileError::Io(err));
            }
        };
        self.stream_position = Some(content_offset + n_read as u64);
        if n_read < content.len() {
            return Err(ShapefileError::TruncatedData {
                offset: content_offset as usize,
                needed: content.len(),
                available: n_read,
            });
        }

        self.next_record_offset = record_end;
        trace!("Read record {} ({} bytes at {})", record_header.record_number, content.len(), content_offset);
        RawRecord::new(record_header.record_number, record_header.content_length, content).map(Some)
    }
}

impl<R: Read + Seek> Iterator for ShpRecordReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Opens a ".shp" file and reads it sequentially, without an index.
pub fn open(path: &Path) -> Result<ShpRecordReader<io::BufReader<fs::File>>> {
    let f = fs::File::open(path)?;
    ShpRecordReader::new(io::BufReader::new(f), None)
}
