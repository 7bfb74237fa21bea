use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, info, trace, warn};

use super::components;
use super::components::ComponentPaths;
use super::dbf;
use super::dbf::DbfTable;
use super::error::{Result, ShapefileError};
use super::geometry;
use super::options::{ReadOptions, RecordErrorPolicy};
use super::shp::{read_shp_header, RawRecord, ShpHeader, ShpRecordReader};
use super::shx;
use super::shx::IndexRecord;
use crate::geo::Geometry;

type ShpFile = io::BufReader<fs::File>;

/// Where a `ShapefileSession` is in its life.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been read yet; no file is open.
    Unopened,
    /// The ".shp" header is decoded and the ".shp" file is open.
    HeaderRead,
    /// The index and attribute table are loaded; records can be read.
    Iterating,
    /// Every file handle is released.
    Closed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match *self {
            SessionState::Unopened => "unopened",
            SessionState::HeaderRead => "header-read",
            SessionState::Iterating => "iterating",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reads geometries out of a ".shp"/".shx"/".dbf" triplet.
///
/// A session moves through `Unopened`, `HeaderRead`, `Iterating` and
/// `Closed`, in that order. Calling a method out of order fails with
/// `InvalidState`; a failed `read_header()` leaves the session `Unopened`
/// with no file open.
///
/// The session exclusively owns its read position. It has no internal
/// locking: to read from several threads, wrap it in a `Mutex`.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use shpreader::read::shapefile::{ReadOptions, ShapefileSession};
///
/// let mut session = ShapefileSession::new(Path::new("parcels.shp"), ReadOptions::default());
///
/// // Cheap: only the 100-byte header
/// println!("{}", session.read_header().unwrap());
///
/// // Loads the ".shx" index and ".dbf" field catalog
/// session.begin().unwrap();
///
/// while let Some(geometry) = session.next_geometry().unwrap() {
///     println!("{}", geometry);
/// }
///
/// session.close(); // also happens on drop
/// ```
pub struct ShapefileSession {
    path: PathBuf,
    options: ReadOptions,
    state: SessionState,
    components: Option<ComponentPaths>,
    header: Option<ShpHeader>,
    table: Option<DbfTable>,
    n_index_records: usize,
    shp_file: Option<ShpFile>,
    reader: Option<ShpRecordReader<ShpFile>>,
    aborted: bool,
}

impl ShapefileSession {
    /// Creates an `Unopened` session. Doesn't touch the filesystem.
    ///
    /// `path` may name the ".shp", ".shx" or ".dbf" file, or their common
    /// base path.
    pub fn new(path: &Path, options: ReadOptions) -> ShapefileSession {
        ShapefileSession {
            path: path.to_path_buf(),
            options: options,
            state: SessionState::Unopened,
            components: None,
            header: None,
            table: None,
            n_index_records: 0,
            shp_file: None,
            reader: None,
            aborted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// The component paths without extension.
    pub fn base_path(&self) -> PathBuf {
        match self.components {
            Some(ref c) => c.base.clone(),
            None => components::base_path(&self.path),
        }
    }

    pub fn components(&self) -> Option<&ComponentPaths> {
        self.components.as_ref()
    }

    /// The ".shp" header, once it's been read.
    pub fn header(&self) -> Option<&ShpHeader> {
        self.header.as_ref()
    }

    /// The ".dbf" header and field catalog, once `begin()` has loaded it.
    pub fn table(&self) -> Option<&DbfTable> {
        self.table.as_ref()
    }

    /// The number of ".shx" entries. 0 when no index is loaded.
    pub fn record_count(&self) -> usize {
        self.n_index_records
    }

    /// The index entries, when reading through the index.
    pub fn index(&self) -> Option<&[IndexRecord]> {
        self.reader.as_ref().and_then(|r| r.index())
    }

    fn invalid_state(&self, operation: &'static str) -> ShapefileError {
        ShapefileError::InvalidState {
            operation: operation,
            state: self.state.name(),
        }
    }

    /// Unopened -> HeaderRead: finds the three component files, opens the
    /// ".shp" and decodes its header.
    ///
    /// On failure the session stays `Unopened` and no file stays open. In
    /// `HeaderRead` or `Iterating`, returns the header already read.
    pub fn read_header(&mut self) -> Result<&ShpHeader> {
        match self.state {
            SessionState::Unopened => {}
            SessionState::HeaderRead | SessionState::Iterating => {
                return self.header.as_ref().ok_or(ShapefileError::InvalidState {
                    operation: "read the header",
                    state: self.state.name(),
                });
            }
            SessionState::Closed => return Err(self.invalid_state("read the header")),
        }

        let components = components::locate(&self.path)?;
        let mut file = io::BufReader::new(fs::File::open(&components.shp)?);
        let header = read_shp_header(&mut file)?;

        debug!("Read header of {}: {} shapes, {} bytes", components.shp.display(), header.shape_type, header.file_n_bytes());
        self.components = Some(components);
        self.shp_file = Some(file);
        self.state = SessionState::HeaderRead;
        let header: &ShpHeader = self.header.get_or_insert(header);
        Ok(header)
    }

    /// HeaderRead -> Iterating: decodes the whole index (unless
    /// `use_index` is off) and the ".dbf" field catalog.
    ///
    /// From `Unopened`, reads the header first. If the index or table then
    /// fail, the session stays `HeaderRead`.
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            SessionState::Unopened => { self.read_header()?; }
            SessionState::HeaderRead => {}
            SessionState::Iterating | SessionState::Closed => return Err(self.invalid_state("begin iterating")),
        }

        let (components, header) = match (self.components.as_ref(), self.header) {
            (Some(components), Some(header)) => (components.clone(), header),
            _ => return Err(self.invalid_state("begin iterating")),
        };

        let index = if self.options.use_index {
            let index = shx::read_index(&mut io::BufReader::new(fs::File::open(&components.shx)?))?;
            debug!("Reading {} through its index ({} entries)", components.shp.display(), index.len());
            Some(index)
        } else {
            debug!("Reading {} sequentially", components.shp.display());
            None
        };
        let n_index_records = index.as_ref().map(|i| i.len()).unwrap_or(0);

        let table = match dbf::open(&components.dbf, self.options.dbf_encoding) {
            Ok(table) => {
                debug!("Attribute table {}: {} records, {} fields", components.dbf.display(), table.n_records, table.fields.len());
                if index.is_some() && table.n_records != n_index_records {
                    warn!("{} has {} index entries, but {} has {} records", components.shx.display(), n_index_records, components.dbf.display(), table.n_records);
                }
                Some(table)
            }
            Err(err) => {
                if self.options.require_table {
                    return Err(err);
                }
                warn!("Ignoring attribute table {}: {}", components.dbf.display(), err);
                None
            }
        };

        let file = match self.shp_file.take() {
            Some(file) => file,
            None => return Err(self.invalid_state("begin iterating")),
        };

        info!("Opened {} ({} shapes, {} index entries)", components.shp.display(), header.shape_type, n_index_records);
        self.reader = Some(ShpRecordReader::with_header(file, header, index)?);
        self.table = table;
        self.n_index_records = n_index_records;
        self.state = SessionState::Iterating;
        Ok(())
    }

    /// Reads the next raw record, Null records included.
    ///
    /// Returns `Ok(None)` at the end of the records, and after
    /// `RecordErrorPolicy::Abort` has stopped the session.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        if self.state != SessionState::Iterating {
            return Err(self.invalid_state("read a record"));
        }
        if self.aborted {
            return Ok(None);
        }
        match self.reader {
            Some(ref mut reader) => reader.next_record(),
            None => Err(ShapefileError::InvalidState {
                operation: "read a record",
                state: self.state.name(),
            }),
        }
    }

    /// Decodes the next non-Null geometry.
    ///
    /// Returns `Ok(None)` at the end of the records. What happens to a
    /// record that fails to decode depends on `ReadOptions::record_errors`.
    pub fn next_geometry(&mut self) -> Result<Option<Geometry>> {
        if self.state != SessionState::Iterating {
            return Err(self.invalid_state("read a geometry"));
        }
        if self.aborted {
            return Ok(None);
        }

        let shape_type = match self.header {
            Some(ref header) => header.shape_type,
            None => return Err(self.invalid_state("read a geometry")),
        };

        loop {
            let result = self.next_record().and_then(|record| match record {
                None => Ok(None),
                Some(record) => geometry::decode_record(shape_type, &record).map(|g| Some((record.record_number, g))),
            });

            let err = match result {
                Ok(None) => return Ok(None),
                Ok(Some((record_number, None))) => {
                    trace!("Record {} is a Null shape", record_number);
                    continue;
                }
                Ok(Some((_, Some(geometry)))) => return Ok(Some(geometry)),
                Err(err) => err,
            };

            if !err.is_record_error() {
                return Err(err);
            }

            match self.options.record_errors {
                RecordErrorPolicy::Yield => return Err(err),
                RecordErrorPolicy::Skip => {
                    warn!("Skipping record in {}: {}", self.path.display(), err);
                }
                RecordErrorPolicy::Abort => {
                    self.aborted = true;
                    return Err(err);
                }
            }
        }
    }

    /// Opens the sibling file with extension `ext` (".prj", "CPG", ...).
    ///
    /// The caller owns the returned handle; the session doesn't track it.
    pub fn open_component(&self, ext: &str) -> Result<fs::File> {
        if self.state == SessionState::Closed {
            return Err(self.invalid_state("open a component file"));
        }

        let base = self.base_path();
        match components::component_path(&base, ext)? {
            Some(path) => {
                debug!("Opening component {}", path.display());
                Ok(fs::File::open(path)?)
            }
            None => Err(ShapefileError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {} file next to {}", ext, base.display()),
            ))),
        }
    }

    /// Releases every file handle. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        let was_open = self.state != SessionState::Unopened;
        self.shp_file = None;
        self.reader = None;
        self.state = SessionState::Closed;

        if was_open {
            info!("Closed {}", self.path.display());
        }
    }
}

impl Drop for ShapefileSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ShapefileSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ShapefileSession")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("options", &self.options)
            .field("header", &self.header)
            .field("n_index_records", &self.n_index_records)
            .finish()
    }
}

/// Yields geometries until the end of the records. Yields nothing unless the
/// session is `Iterating`.
impl Iterator for ShapefileSession {
    type Item = Result<Geometry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != SessionState::Iterating {
            return None;
        }

        match self.next_geometry() {
            Ok(Some(geometry)) => Some(Ok(geometry)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Opens the shapefile at `path` with default options, ready to iterate.
///
/// `path` may name any of the three component files.
pub fn open(path: &Path) -> Result<ShapefileSession> {
    open_with(path, ReadOptions::default())
}

pub fn open_with(path: &Path, options: ReadOptions) -> Result<ShapefileSession> {
    let mut session = ShapefileSession::new(path, options);
    session.begin()?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use tempfile;
    use super::*;
    use super::super::fixtures;
    use super::super::shp::ShapeType;
    use crate::geo::Point;

    fn three_points() -> fixtures::Fixture {
        fixtures::build(1, &[
            fixtures::point_content(1., 2.),
            fixtures::point_content(3., 4.),
            fixtures::point_content(5., 6.),
        ])
    }

    fn one_bad_point() -> fixtures::Fixture {
        fixtures::build(1, &[
            fixtures::point_content(1., 2.),
            vec![ 1, 0, 0, 0, 0, 0, 0, 0 ],
            fixtures::point_content(5., 6.),
        ])
    }

    #[test]
    fn polygon_with_two_parts() {
        let dir = tempfile::tempdir().unwrap();
        let points = [ (0., 0.), (0., 10.), (10., 10.), (5., 5.), (6., 6.) ];
        let fixture = fixtures::build(5, &[ fixtures::poly_content(5, &[ 0, 3 ], &points) ]);
        let path = fixtures::write(dir.path(), "polygons", &fixture);

        let mut session = open(&path).unwrap();
        assert_eq!(SessionState::Iterating, session.state());
        assert_eq!(1, session.record_count());
        assert_eq!(ShapeType::Polygon, session.header().unwrap().shape_type);

        match session.next_geometry().unwrap() {
            Some(Geometry::Polygon(polygon)) => {
                assert_eq!(2, polygon.parts.len());
                assert_eq!(3, polygon.parts[0].len());
                assert_eq!(2, polygon.parts[1].len());
                assert_eq!(Point::new(5., 5.), polygon.parts[1].0[0]);
            }
            other => panic!("expected a Polygon, got {:?}", other),
        }
        assert!(session.next_geometry().unwrap().is_none());
        assert!(session.next_geometry().unwrap().is_none());
    }

    #[test]
    fn state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "points", &three_points());
        let mut session = ShapefileSession::new(&dir.path().join("points"), ReadOptions::default());

        assert_eq!(SessionState::Unopened, session.state());
        match session.next_geometry() {
            Err(ShapefileError::InvalidState { state: "unopened", .. }) => {},
            other => panic!("expected InvalidState, got {:?}", other),
        }

        assert_eq!(ShapeType::Point, session.read_header().unwrap().shape_type);
        assert_eq!(SessionState::HeaderRead, session.state());
        assert_eq!(path, session.components().unwrap().shp);
        assert!(session.table().is_none());

        session.begin().unwrap();
        assert_eq!(SessionState::Iterating, session.state());
        assert_eq!(3, session.table().unwrap().n_records);
        assert!(session.begin().is_err());

        assert_eq!(Some(Geometry::Point(Point::new(1., 2.))), session.next_geometry().unwrap());

        session.close();
        session.close();
        assert_eq!(SessionState::Closed, session.state());
        assert!(session.next_geometry().is_err());
        assert!(session.read_header().is_err());
        assert!(session.next().is_none());
    }

    #[test]
    fn missing_components_leave_session_unopened() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lonely.shp"), &three_points().shp).unwrap();
        let mut session = ShapefileSession::new(&dir.path().join("lonely.shp"), ReadOptions::default());

        match session.read_header() {
            Err(ShapefileError::MissingComponents { .. }) => {},
            other => panic!("expected MissingComponents, got {:?}", other),
        }
        assert_eq!(SessionState::Unopened, session.state());
        assert!(session.header().is_none());
    }

    #[test]
    fn wrong_file_code_leaves_session_unopened() {
        let dir = tempfile::tempdir().unwrap();
        let mut fixture = three_points();
        fixture.shp[0] = 1;
        let path = fixtures::write(dir.path(), "fake", &fixture);
        let mut session = ShapefileSession::new(&path, ReadOptions::default());

        match session.read_header() {
            Err(ShapefileError::NotAShapefile { .. }) => {},
            other => panic!("expected NotAShapefile, got {:?}", other),
        }
        assert_eq!(SessionState::Unopened, session.state());
        assert!(open(&path).is_err());
    }

    #[test]
    fn null_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::build(1, &[
            fixtures::point_content(1., 2.),
            fixtures::null_content(),
            fixtures::point_content(5., 6.),
        ]);
        let path = fixtures::write(dir.path(), "sparse", &fixture);

        let geometries = open(&path).unwrap().collect::<Result<Vec<Geometry>>>().unwrap();
        assert_eq!(vec![
            Geometry::Point(Point::new(1., 2.)),
            Geometry::Point(Point::new(5., 6.)),
        ], geometries);
    }

    #[test]
    fn next_record_includes_null_records() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::build(1, &[ fixtures::null_content() ]);
        let path = fixtures::write(dir.path(), "null", &fixture);
        let mut session = open(&path).unwrap();

        let record = session.next_record().unwrap().unwrap();
        assert_eq!(2, record.content_length);
        assert_eq!(Some(0), record.shape_tag());
        assert!(session.next_record().unwrap().is_none());
    }

    #[test]
    fn sequential_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "points", &three_points());

        let session = open_with(&path, ReadOptions::new().use_index(false)).unwrap();
        assert_eq!(0, session.record_count());
        assert!(session.index().is_none());

        let xs: Vec<f64> = session.map(|g| g.unwrap().points()[0].x).collect();
        assert_eq!(vec![ 1., 3., 5. ], xs);
    }

    #[test]
    fn record_errors_yield_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "bad", &one_bad_point());
        let mut session = open(&path).unwrap();

        assert!(session.next_geometry().unwrap().is_some());
        match session.next_geometry() {
            Err(ShapefileError::InsufficientBuffer { shape_type: ShapeType::Point, len: 8, needed: 20 }) => {},
            other => panic!("expected InsufficientBuffer, got {:?}", other),
        }
        assert_eq!(Some(Geometry::Point(Point::new(5., 6.))), session.next_geometry().unwrap());
        assert!(session.next_geometry().unwrap().is_none());
    }

    #[test]
    fn record_errors_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "bad", &one_bad_point());
        let options = ReadOptions::new().record_errors(RecordErrorPolicy::Skip);

        let geometries = open_with(&path, options).unwrap().collect::<Result<Vec<Geometry>>>().unwrap();
        assert_eq!(2, geometries.len());
    }

    #[test]
    fn record_errors_abort() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "bad", &one_bad_point());
        let options = ReadOptions::new().record_errors(RecordErrorPolicy::Abort);

        let results: Vec<_> = open_with(&path, options).unwrap().collect();
        assert_eq!(2, results.len());
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn abort_stops_raw_records_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "bad", &one_bad_point());
        let options = ReadOptions::new().record_errors(RecordErrorPolicy::Abort);
        let mut session = open_with(&path, options).unwrap();

        assert!(session.next_geometry().unwrap().is_some());
        assert!(session.next_geometry().is_err());
        assert!(session.next_geometry().unwrap().is_none());
        assert!(session.next_record().unwrap().is_none());
    }

    #[test]
    fn broken_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "points", &three_points());
        fs::write(dir.path().join("points.dbf"), b"junk").unwrap();

        let session = open(&path).unwrap();
        assert!(session.table().is_none());
        assert_eq!(3, session.count());

        match open_with(&path, ReadOptions::new().require_table(true)) {
            Err(ShapefileError::InvalidTable(_)) => {},
            other => panic!("expected InvalidTable, got {:?}", other),
        }
    }

    #[test]
    fn empty_table_file_still_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "points", &three_points());
        fs::write(dir.path().join("points.dbf"), b"").unwrap();

        let mut session = open(&path).unwrap();
        assert_eq!(SessionState::Iterating, session.state());
        assert_eq!(Some(Geometry::Point(Point::new(1., 2.))), session.next_geometry().unwrap());
    }

    #[test]
    fn open_component_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write(dir.path(), "points", &three_points());
        fs::write(dir.path().join("points.PRJ"), b"GEOGCS[]").unwrap();
        let mut session = ShapefileSession::new(&path, ReadOptions::default());

        assert!(session.open_component(".prj").is_ok());
        assert!(session.open_component("dbf").is_ok());
        match session.open_component("cpg") {
            Err(ShapefileError::Io(ref err)) if err.kind() == io::ErrorKind::NotFound => {},
            other => panic!("expected NotFound, got {:?}", other),
        }

        session.close();
        assert!(session.open_component("prj").is_err());
    }
}
