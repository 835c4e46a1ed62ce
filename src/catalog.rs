//! The profile catalog.
//!
//! A [`Catalog`] is the finished, ordered list of matchable profiles
//! loaded from a profile directory. It is immutable after construction;
//! matching walks it in insertion order and the first satisfying profile
//! wins, so load order is match priority.

use crate::caps::Structure;
use crate::loader;
use crate::profile::{Profile, StreamKind};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// An ordered, read-only collection of named profiles.
pub struct Catalog {
    profiles: Vec<Profile>,
}

impl Catalog {
    /// Load a catalog from a profile directory.
    ///
    /// Scans `dir` for `.xml` documents (sorted name order), loads them
    /// with their transitive includes, and drops anonymous
    /// (inheritance-only) profiles. Loading is best-effort: broken
    /// documents cost their own profiles, nothing else. An unreadable
    /// directory yields an empty catalog.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        Self::from_profiles(loader::load_profiles(dir))
    }

    /// Build a catalog from already-assembled profiles.
    ///
    /// Anonymous profiles are filtered out, matching what [`load`](Self::load)
    /// does for on-disk definitions.
    pub fn from_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .filter(|p| !p.is_anonymous())
                .collect(),
        }
    }

    /// The process-wide shared catalog, loaded on first use.
    ///
    /// The `MEDIALENS_PROFILE_DIR` environment variable overrides
    /// `default_dir`. The load runs exactly once even under concurrent
    /// first access; later calls (and later values of the environment
    /// variable) reuse the same instance. Prefer [`load`](Self::load) and
    /// explicit threading where possible.
    pub fn shared(default_dir: impl AsRef<Path>) -> &'static Catalog {
        static SHARED: OnceLock<Catalog> = OnceLock::new();
        SHARED.get_or_init(|| {
            let dir = std::env::var_os("MEDIALENS_PROFILE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_dir.as_ref().to_path_buf());
            Catalog::load(dir)
        })
    }

    /// Look a profile up by exact name. First match in load order.
    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name() == name)
    }

    /// All profiles, in match-priority order.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True if no profiles loaded.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The names of all profiles, in order.
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name()).collect()
    }

    /// The distinct concrete formats the catalog accepts for a stream
    /// kind ([`StreamKind::Container`] lists container caps).
    ///
    /// Formats are normalized for listing: set-valued fields are exploded
    /// into one structure per combination, range fields are dropped as
    /// unconstrained, and raw/placeholder formats are skipped.
    pub fn supported_formats(&self, kind: StreamKind) -> Vec<Structure> {
        let mut formats = Vec::new();
        for profile in &self.profiles {
            let caps_iter: Vec<&crate::caps::Caps> = if kind == StreamKind::Container {
                vec![profile.container()]
            } else {
                profile
                    .streams()
                    .iter()
                    .filter(|s| s.kind == kind)
                    .map(|s| &s.caps)
                    .collect()
            };
            for caps in caps_iter {
                for structure in caps.normalize() {
                    if !formats.contains(&structure) {
                        formats.push(structure);
                    }
                }
            }
        }
        formats
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("profiles", &self.profiles.len())
            .finish()
    }
}
