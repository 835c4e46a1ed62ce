//! Profile-definition loading.
//!
//! A [`LoadSession`] turns a directory of profile-definition documents
//! (plus their transitive `<include>`s) into a list of [`Profile`]s. All
//! errors below the document level are recoverable: the loader logs them
//! and keeps going, so a broken restriction never takes down the whole
//! catalog.

mod xml;

use crate::profile::{Profile, Restriction};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// State shared across one profile-loading pass.
///
/// The restriction and profile-id symbol tables are session-scoped so that
/// `<parent>` and `base-profile` references resolve across included files;
/// the seen-files set breaks include cycles.
pub struct LoadSession {
    root_dir: PathBuf,
    restrictions: HashMap<String, Restriction>,
    profile_ids: HashMap<String, Profile>,
    seen: HashSet<PathBuf>,
}

impl LoadSession {
    /// Create a session rooted at the given profile directory.
    ///
    /// Relative `<include ref>` paths resolve against this directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            restrictions: HashMap::new(),
            profile_ids: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    pub(crate) fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub(crate) fn restriction(&self, id: &str) -> Option<&Restriction> {
        self.restrictions.get(id)
    }

    pub(crate) fn store_restriction(&mut self, id: String, restriction: Restriction) {
        self.restrictions.insert(id, restriction);
    }

    pub(crate) fn profile(&self, id: &str) -> Option<&Profile> {
        self.profile_ids.get(id)
    }

    pub(crate) fn store_profile(&mut self, id: String, profile: Profile) {
        self.profile_ids.insert(id, profile);
    }

    /// Load one profile-definition document.
    ///
    /// Documents are identified by canonical path; loading the same path a
    /// second time within the session is a no-op, which is what terminates
    /// mutually-including files.
    pub fn load_file(&mut self, path: &Path) -> Vec<Profile> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.seen.insert(canonical.clone()) {
            tracing::trace!(path = %canonical.display(), "document already loaded");
            return Vec::new();
        }

        let document = match fs::read_to_string(&canonical).map_err(crate::error::Error::from) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    path = %canonical.display(),
                    error = %err,
                    "could not read profile document"
                );
                return Vec::new();
            }
        };

        let mut profiles = Vec::new();
        if let Err(err) = xml::parse_document(&document, self, &mut profiles) {
            // Keep whatever parsed before the document went bad.
            tracing::warn!(
                path = %canonical.display(),
                error = %err,
                "stopped loading malformed profile document"
            );
        }
        profiles
    }

    /// Load every `.xml` document in the session's root directory.
    ///
    /// Files load in sorted name order so that first-match-wins behaves
    /// the same on every filesystem. An unreadable directory yields an
    /// empty list.
    pub fn load_dir(&mut self) -> Vec<Profile> {
        let entries = match fs::read_dir(&self.root_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    dir = %self.root_dir.display(),
                    error = %err,
                    "could not open profile directory"
                );
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "xml") && path.is_file())
            .collect();
        paths.sort();

        let mut profiles = Vec::new();
        for path in paths {
            profiles.extend(self.load_file(&path));
        }
        profiles
    }
}

/// Load all profiles under a directory, including anonymous
/// (inheritance-only) ones. Most callers want [`crate::catalog::Catalog::load`],
/// which filters those out.
pub fn load_profiles(dir: impl AsRef<Path>) -> Vec<Profile> {
    LoadSession::new(dir.as_ref()).load_dir()
}
