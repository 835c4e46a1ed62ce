//! DLNA profiles and stream restrictions.
//!
//! A [`Profile`] is a complete, named interoperability target: a container
//! format caps plus one [`StreamProfile`] per elementary-stream kind it
//! restricts. Profiles are assembled by the loader from
//! [`Restriction`]s and may inherit from one another via `base-profile`
//! references.

use crate::caps::Caps;
use crate::error::{Error, Result};
use std::fmt;

/// Classification of a media stream or restriction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Container/muxing format (becomes the profile's container caps).
    Container,
    /// Audio elementary stream.
    Audio,
    /// Video elementary stream.
    Video,
    /// Still image. Kept distinct from video internally; image profiles
    /// are matched under the video rule but never count as video profiles.
    Image,
    /// Stream of unrecognized type.
    Unknown,
}

impl StreamKind {
    /// Map a restriction document's `type` attribute to a stream kind.
    ///
    /// Returns `None` for unsupported type names; the loader warns and
    /// skips those restrictions.
    pub fn from_restriction_type(name: &str) -> Option<Self> {
        match name {
            "container" => Some(StreamKind::Container),
            "audio" => Some(StreamKind::Audio),
            "video" => Some(StreamKind::Video),
            "image" => Some(StreamKind::Image),
            _ => None,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::Container => "container",
            StreamKind::Audio => "audio",
            StreamKind::Video => "video",
            StreamKind::Image => "image",
            StreamKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// A reusable, inheritable fragment of caps constraints tagged with a
/// stream kind. Restrictions only exist while a load session runs; once
/// attached to a profile they become [`StreamProfile`]s or container caps.
#[derive(Clone, Debug, PartialEq)]
pub struct Restriction {
    /// Symbol-table id for `<parent name=...>` lookups, if declared.
    pub id: Option<String>,
    /// Which stream kind this restriction constrains.
    pub kind: StreamKind,
    /// The assembled constraints.
    pub caps: Caps,
}

/// Restrictions a profile places on one elementary-stream kind.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamProfile {
    /// The stream kind these caps apply to.
    pub kind: StreamKind,
    /// Acceptable formats for streams of that kind.
    pub caps: Caps,
}

impl StreamProfile {
    /// Create a new stream profile.
    pub fn new(kind: StreamKind, caps: Caps) -> Self {
        Self { kind, caps }
    }
}

/// A complete DLNA interoperability profile.
///
/// A profile with an empty name is inheritance-only scaffolding: it can be
/// referenced as a `base-profile` while loading but is excluded from the
/// final catalog and never matches.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    name: String,
    mime: String,
    container: Caps,
    streams: Vec<StreamProfile>,
}

impl Profile {
    /// Create a new profile with the given container caps.
    ///
    /// Use [`Caps::none`] for container-less (elementary-stream) profiles.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, container: Caps) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            container,
            streams: Vec::new(),
        }
    }

    /// Create a profile inheriting from `base`.
    ///
    /// The child takes a deep copy of the base's container caps and stream
    /// profiles; its own name and MIME type always replace the base's, and
    /// its own container caps (when declared) replace the inherited ones.
    pub fn inherit(
        name: impl Into<String>,
        mime: impl Into<String>,
        base: &Profile,
        container: Option<Caps>,
    ) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            container: container.unwrap_or_else(|| base.container.clone()),
            streams: base.streams.clone(),
        }
    }

    /// The DLNA profile name (empty for inheritance-only profiles).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The MIME type advertised for media matching this profile.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The container format caps ([`Caps::none`] if no container).
    pub fn container(&self) -> &Caps {
        &self.container
    }

    /// The per-stream-kind restriction sets, in declaration order.
    pub fn streams(&self) -> &[StreamProfile] {
        &self.streams
    }

    /// True if this profile exists only as an inheritance target.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// True if this profile restricts a true video stream.
    ///
    /// Image restrictions do not count: an image-only profile passes the
    /// "no video profile" guards on the audio and image matching paths.
    pub fn has_video_stream(&self) -> bool {
        self.streams.iter().any(|s| s.kind == StreamKind::Video)
    }

    /// Add a stream restriction to this profile.
    ///
    /// A restriction of a kind already present merges its caps fields into
    /// the existing entry (the earlier entry wins on field collisions); a
    /// new kind is appended. Container-less profiles may carry at most one
    /// stream profile in total; a second append fails with
    /// [`Error::InvalidProfile`].
    pub fn add_stream(&mut self, stream: StreamProfile) -> Result<()> {
        if let Some(existing) = self.streams.iter_mut().find(|s| s.kind == stream.kind) {
            existing.caps.merge_fields_from(&stream.caps);
            return Ok(());
        }
        if self.container.is_empty() && !self.streams.is_empty() {
            return Err(Error::InvalidProfile(self.name.clone()));
        }
        self.streams.push(stream);
        Ok(())
    }
}
