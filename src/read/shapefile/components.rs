//! Finds the files that make up a shapefile.
//!
//! A shapefile "foo" is `foo.shp`, `foo.shx` and `foo.dbf` in one directory.
//! Extensions are matched case-insensitively, because files that came from
//! Windows are often named `FOO.SHP`.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::debug;
use regex::Regex;

use super::error::{Result, ShapefileError};
use super::shp::{read_shp_header, ShpHeader};

lazy_static! {
    static ref COMPONENT_EXTENSION: Regex = Regex::new(r"(?i)^(shp|shx|dbf)$").unwrap();
}

/// The three files of one shapefile, as they're named on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPaths {
    /// The common path, without extension.
    pub base: PathBuf,
    pub shp: PathBuf,
    pub shx: PathBuf,
    pub dbf: PathBuf,
}

/// Strips a ".shp", ".shx" or ".dbf" extension. Other extensions are part of
/// the name: "roads.v2" stays "roads.v2".
pub fn base_path(path: &Path) -> PathBuf {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) if COMPONENT_EXTENSION.is_match(ext) => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

fn directory_of(base: &Path) -> &Path {
    match base.parent() {
        Some(dir) if dir.as_os_str().len() > 0 => dir,
        _ => Path::new("."),
    }
}

/// Finds the sibling of `base` with extension `ext`.
///
/// `ext` may be given with or without its leading dot. Returns `Ok(None)`
/// when there's no such file (or no such directory).
pub fn component_path(base: &Path, ext: &str) -> io::Result<Option<PathBuf>> {
    let ext = ext.trim_start_matches('.');
    let stem = match base.file_name() {
        Some(stem) => stem,
        None => return Ok(None),
    };

    let entries = match fs::read_dir(directory_of(base)) {
        Ok(entries) => entries,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut matches = Vec::<PathBuf>::new();
    for entry in entries {
        let path = entry?.path();
        let same_stem = path.file_stem() == Some(stem);
        let same_ext = path.extension()
            .and_then(OsStr::to_str)
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
        if same_stem && same_ext && path.is_file() {
            matches.push(path);
        }
    }

    // On case-sensitive filesystems "a.shp" and "a.SHP" can both exist:
    // prefer the exact spelling, then the first in byte order.
    matches.sort();
    let exact = matches.iter().position(|p| p.extension() == Some(OsStr::new(ext)));
    Ok(match exact {
        Some(i) => Some(matches.swap_remove(i)),
        None => matches.into_iter().next(),
    })
}

/// Resolves all three components of the shapefile at `path`.
///
/// `path` may name any of the three files, or the base path itself. Fails
/// with `MissingComponents`, listing every missing extension.
pub fn locate(path: &Path) -> Result<ComponentPaths> {
    let base = base_path(path);

    let shp = component_path(&base, "shp")?;
    let shx = component_path(&base, "shx")?;
    let dbf = component_path(&base, "dbf")?;

    match (shp, shx, dbf) {
        (Some(shp), Some(shx), Some(dbf)) => Ok(ComponentPaths {
            base: base,
            shp: shp,
            shx: shx,
            dbf: dbf,
        }),
        (shp, shx, dbf) => {
            let missing = [ ("shp", shp.is_none()), ("shx", shx.is_none()), ("dbf", dbf.is_none()) ]
                .iter()
                .filter(|&&(_, is_missing)| is_missing)
                .map(|&(ext, _)| ext)
                .collect();
            Err(ShapefileError::MissingComponents {
                base: base,
                missing: missing,
            })
        }
    }
}

/// True when `path` (with its extension stripped) has all three siblings.
pub fn has_components(path: &Path) -> bool {
    locate(path).is_ok()
}

/// Reads the main header of every ".shp" file in `dir`, sorted by path.
///
/// Files whose header doesn't decode are left out. The directory itself must
/// be readable.
pub fn headers_in_directory(dir: &Path) -> Result<Vec<(PathBuf, ShpHeader)>> {
    let mut paths = Vec::<PathBuf>::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_shp = path.extension()
            .and_then(OsStr::to_str)
            .map(|e| e.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);
        if is_shp && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut ret = Vec::with_capacity(paths.len());
    for path in paths {
        let header = fs::File::open(&path)
            .map_err(ShapefileError::from)
            .and_then(|f| read_shp_header(&mut io::BufReader::new(f)));

        match header {
            Ok(header) => ret.push((path, header)),
            Err(err) => debug!("Skipping {}: {}", path.display(), err),
        }
    }

    debug!("Found {} shapefile headers in {}", ret.len(), dir.display());
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use tempfile;
    use super::*;
    use super::super::fixtures;
    use super::super::shp::ShapeType;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn base_path_strips_component_extensions_only() {
        assert_eq!(Path::new("a/roads"), base_path(Path::new("a/roads.shp")));
        assert_eq!(Path::new("a/roads"), base_path(Path::new("a/roads.DBF")));
        assert_eq!(Path::new("a/roads"), base_path(Path::new("a/roads")));
        assert_eq!(Path::new("a/roads.v2"), base_path(Path::new("a/roads.v2")));
    }

    #[test]
    fn locate_complete_triplet() {
        let dir = tempfile::tempdir().unwrap();
        for name in [ "roads.shp", "roads.shx", "roads.dbf", "rivers.shp" ].iter() {
            touch(dir.path(), name);
        }

        let components = locate(&dir.path().join("roads.shx")).unwrap();
        assert_eq!(dir.path().join("roads"), components.base);
        assert_eq!(dir.path().join("roads.shp"), components.shp);
        assert_eq!(dir.path().join("roads.shx"), components.shx);
        assert_eq!(dir.path().join("roads.dbf"), components.dbf);
    }

    #[test]
    fn locate_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in [ "ROADS.SHP", "ROADS.Shx", "ROADS.dbf" ].iter() {
            touch(dir.path(), name);
        }

        let components = locate(&dir.path().join("ROADS")).unwrap();
        assert_eq!(dir.path().join("ROADS.SHP"), components.shp);
        assert_eq!(dir.path().join("ROADS.Shx"), components.shx);
    }

    #[test]
    fn locate_lists_missing_components() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "roads.shp");

        match locate(&dir.path().join("roads.shp")) {
            Err(ShapefileError::MissingComponents { ref missing, .. }) => {
                assert_eq!(&vec![ "shx", "dbf" ], missing);
            }
            other => panic!("expected MissingComponents, got {:?}", other),
        }
        assert!(!has_components(&dir.path().join("roads")));
    }

    #[test]
    fn locate_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();

        match locate(&dir.path().join("nope").join("roads")) {
            Err(ShapefileError::MissingComponents { ref missing, .. }) => assert_eq!(3, missing.len()),
            other => panic!("expected MissingComponents, got {:?}", other),
        }
    }

    #[test]
    fn component_path_accepts_leading_dot() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "roads.prj");
        let base = dir.path().join("roads");

        assert_eq!(Some(dir.path().join("roads.prj")), component_path(&base, ".prj").unwrap());
        assert_eq!(Some(dir.path().join("roads.prj")), component_path(&base, "PRJ").unwrap());
        assert_eq!(None, component_path(&base, "cpg").unwrap());
    }

    #[test]
    fn directory_scan_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let points = fixtures::build(1, &[ fixtures::point_content(1., 2.) ]);
        let polygons = fixtures::build(5, &[]);
        fixtures::write(dir.path(), "b_polygons", &polygons);
        fixtures::write(dir.path(), "a_points", &points);
        fs::write(dir.path().join("c_broken.shp"), b"not a shapefile").unwrap();
        touch(dir.path(), "notes.txt");

        let headers = headers_in_directory(dir.path()).unwrap();

        assert_eq!(2, headers.len());
        assert_eq!(dir.path().join("a_points.shp"), headers[0].0);
        assert_eq!(ShapeType::Point, headers[0].1.shape_type);
        assert_eq!(ShapeType::Polygon, headers[1].1.shape_type);
    }
}
