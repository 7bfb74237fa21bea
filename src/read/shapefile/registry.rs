use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use log::debug;

use super::components;
use super::error::{Result, ShapefileError};
use super::options::ReadOptions;
use super::shapefile::{SessionState, ShapefileSession};

/// Keeps at most one session per shapefile.
///
/// Sessions are keyed by base path (the path without its ".shp", ".shx" or
/// ".dbf" extension), so "roads.shp" and "roads.dbf" are the same key.
/// Paths are compared as given: "./roads" and "roads" are different keys.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shpreader::read::shapefile::{ReadOptions, ReaderRegistry};
///
/// let mut registry = ReaderRegistry::new();
/// registry.open(Path::new("roads.shp"), ReadOptions::default()).unwrap();
///
/// // A second open of the same shapefile fails with AlreadyOpen
/// assert!(registry.open(Path::new("roads.dbf"), ReadOptions::default()).is_err());
///
/// for geometry in registry.get_mut(Path::new("roads")).unwrap() {
///     println!("{}", geometry.unwrap());
/// }
/// ```
#[derive(Debug, Default)]
pub struct ReaderRegistry {
    sessions: HashMap<PathBuf, ShapefileSession>,
}

impl ReaderRegistry {
    pub fn new() -> ReaderRegistry {
        ReaderRegistry::default()
    }

    /// Opens the shapefile at `path` and keeps the session, ready to iterate.
    ///
    /// Fails with `AlreadyOpen` if this registry holds a session for the
    /// same base path that isn't closed yet.
    pub fn open(&mut self, path: &Path, options: ReadOptions) -> Result<&mut ShapefileSession> {
        let key = components::base_path(path);

        let is_open = self.sessions.get(&key)
            .map(|s| s.state() != SessionState::Closed)
            .unwrap_or(false);
        if is_open {
            return Err(ShapefileError::AlreadyOpen(key));
        }

        let session = super::shapefile::open_with(path, options)?;
        debug!("Registered {}", key.display());
        match self.sessions.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(session);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(session)),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&ShapefileSession> {
        self.sessions.get(&components::base_path(path))
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut ShapefileSession> {
        self.sessions.get_mut(&components::base_path(path))
    }

    /// Closes the session for `path`, and forgets it. Returns false if there
    /// was none.
    pub fn close(&mut self, path: &Path) -> bool {
        match self.sessions.remove(&components::base_path(path)) {
            Some(mut session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Forgets sessions that were closed through `get_mut()`. Returns how many.
    pub fn remove_closed(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.state() != SessionState::Closed);
        before - self.sessions.len()
    }

    /// Base paths of the sessions that aren't closed, sorted.
    pub fn active_paths(&self) -> Vec<&Path> {
        let mut ret: Vec<&Path> = self.sessions.iter()
            .filter(|&(_, s)| s.state() != SessionState::Closed)
            .map(|(path, _)| path.as_path())
            .collect();
        ret.sort();
        ret
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
