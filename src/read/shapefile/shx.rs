/// Reads ESRI ".shx" index files.
///
/// The header is the same 100 bytes as the ".shp" header. After it, each
/// record is 8 bytes: big-endian offset, then big-endian content length,
/// both in 16-bit words.
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use log::debug;

use super::cursor::{read_up_to, ByteCursor};
use super::error::Result;
use super::shp::{read_shp_header, ShpHeader, SHP_RECORD_HEADER_LENGTH};

const SHX_RECORD_LENGTH: usize = 8;

/// Where one ".shp" record lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Word offset of the record header from the start of the ".shp".
    pub offset: i32,
    /// Content length in words, record header excluded.
    pub length: i32,
}

impl IndexRecord {
    /// Decodes one 8-byte entry.
    ///
    /// Reversing all eight bytes leaves the length in the first
    /// little-endian word and the offset in the second.
    pub fn parse(buf: &[u8]) -> Result<IndexRecord> {
        let reversed = ByteCursor::new(buf).read_reversed(SHX_RECORD_LENGTH)?;
        let mut cursor = ByteCursor::new(&reversed);
        let length = cursor.read_i32_le()?;
        let offset = cursor.read_i32_le()?;

        Ok(IndexRecord {
            offset: offset,
            length: length,
        })
    }

    /// Byte offset of the record header in the ".shp".
    pub fn record_offset(&self) -> u64 {
        self.offset as u64 * 2
    }

    /// Byte offset of the record content: the header is 8 bytes.
    pub fn content_offset(&self) -> u64 {
        self.record_offset() + SHP_RECORD_HEADER_LENGTH as u64
    }

    pub fn content_n_bytes(&self) -> usize {
        self.length as usize * 2
    }
}

/// Lazily reads index entries. Finite and single-pass: the iterator ends at
/// the first incomplete 8-byte entry.
///
/// # Example
///
/// ```no_run
/// use shpreader::read::shapefile::shx;
///
/// let reader = shx::open("parcels.shx".as_ref()).unwrap();
///
/// for entry in reader {
///     let entry = entry.unwrap();
///     println!("{} bytes at {}", entry.content_n_bytes(), entry.content_offset());
/// }
/// ```
#[derive(Debug)]
pub struct ShxReader<R: Read> {
    file: R,
    pub header: ShpHeader,
    done: bool,
}

impl<R: Read> ShxReader<R> {
    /// Reads the 100-byte header, leaving the stream at the first entry.
    pub fn new(mut file: R) -> Result<ShxReader<R>> {
        let header = read_shp_header(&mut file)?;
        Ok(ShxReader {
            file: file,
            header: header,
            done: false,
        })
    }
}

impl<R: Read> Iterator for ShxReader<R> {
    type Item = Result<IndexRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = [ 0u8; SHX_RECORD_LENGTH ];
        match read_up_to(&mut self.file, &mut buf) {
            Err(err) => {
                self.done = true;
                Some(Err(err.into()))
            }
            Ok(n) if n < SHX_RECORD_LENGTH => {
                self.done = true;
                None
            }
            Ok(_) => Some(IndexRecord::parse(&buf)),
        }
    }
}

/// Reads every index entry, in file order.
pub fn read_index(file: &mut dyn Read) -> Result<Vec<IndexRecord>> {
    let reader = ShxReader::new(file)?;
    let index = reader.collect::<Result<Vec<IndexRecord>>>()?;
    debug!("Read {} index entries", index.len());
    Ok(index)
}

pub fn open(path: &Path) -> Result<ShxReader<io::BufReader<fs::File>>> {
    let f = fs::File::open(path)?;
    ShxReader::new(io::BufReader::new(f))
}
