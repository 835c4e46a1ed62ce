//! Discovered-media model and the discovery-service boundary.
//!
//! The actual demuxing/decoding machinery that inspects a URI lives
//! outside this crate, behind the [`MetadataInspector`] trait. What comes
//! back is a [`MediaInfo`]: a topology of elementary streams, each with
//! negotiated caps plus codec-specific measured parameters. The adapter
//! functions here fold those measured parameters into the caps
//! ([`enriched_audio_caps`], [`enriched_video_caps`]) so the matcher can
//! treat declared and measured fields uniformly, and classify the overall
//! media as audio, video, or image.
//!
//! [`Discoverer`] bundles an inspector with a profile [`Catalog`] and
//! produces [`DlnaInformation`] per URI, either synchronously or through
//! a small FIFO queue with a per-URI completion callback.

use crate::caps::{Caps, Fraction, Value};
use crate::catalog::Catalog;
use crate::error::DiscoveryError;
use crate::matcher::guess_profile;
use crate::profile::{Profile, StreamKind};
use std::collections::VecDeque;
use std::time::Duration;
use url::Url;

/// Index of a node inside a [`StreamTopology`].
pub type NodeId = usize;

/// Measured parameters of an audio stream, from the inspector's decoders.
///
/// `None` means the parameter could not be measured; it then never lands
/// in the enriched caps, which is how restrictions naming that field get
/// rejected for this stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioStreamInfo {
    /// Number of channels.
    pub channels: Option<u32>,
    /// Sampling rate in Hz.
    pub sample_rate: Option<u32>,
    /// Bits per sample.
    pub depth: Option<u32>,
    /// Bitrate in bits/second.
    pub bitrate: Option<u32>,
    /// Maximum bitrate in bits/second.
    pub max_bitrate: Option<u32>,
    /// True if the stream has a variable bitrate.
    pub is_vbr: bool,
}

/// Measured parameters of a video (or image) stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoStreamInfo {
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// Color depth in bits (RGB streams).
    pub depth: Option<u32>,
    /// Frame rate.
    pub framerate: Option<Fraction>,
    /// Pixel aspect ratio.
    pub pixel_aspect_ratio: Option<Fraction>,
    /// True if the stream is interlaced.
    pub interlaced: bool,
    /// True if this is a single-frame (still image) stream.
    pub is_image: bool,
}

/// One stream discovered in a media file.
///
/// Nodes reference each other by [`NodeId`] into their owning
/// [`StreamTopology`], so cloning the topology clones the whole tree with
/// all cross-references intact.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamNode {
    /// Stream classification.
    pub kind: StreamKind,
    /// Negotiated caps as reported by the inspector.
    pub caps: Caps,
    /// Stream tags (e.g. `bitrate`, `maximum-bitrate`).
    pub tags: Vec<(String, Value)>,
    /// Audio parameters, for audio-kind nodes.
    pub audio: Option<AudioStreamInfo>,
    /// Video parameters, for video- and image-kind nodes.
    pub video: Option<VideoStreamInfo>,
    /// Preceding node in a parse/decode chain.
    pub previous: Option<NodeId>,
    /// Following node in a parse/decode chain.
    pub next: Option<NodeId>,
    /// Child streams, for container nodes.
    pub children: Vec<NodeId>,
}

impl StreamNode {
    /// Create a bare node of the given kind.
    pub fn new(kind: StreamKind, caps: Caps) -> Self {
        Self {
            kind,
            caps,
            tags: Vec::new(),
            audio: None,
            video: None,
            previous: None,
            next: None,
            children: Vec::new(),
        }
    }

    /// Attach audio parameters.
    pub fn with_audio(mut self, audio: AudioStreamInfo) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Attach video parameters.
    pub fn with_video(mut self, video: VideoStreamInfo) -> Self {
        self.video = Some(video);
        self
    }

    /// Attach a stream tag.
    pub fn with_tag(mut self, name: impl Into<String>, value: Value) -> Self {
        self.tags.push((name.into(), value));
        self
    }

    /// Get a stream tag by name.
    pub fn tag(&self, name: &str) -> Option<&Value> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value)
    }

    fn is_image(&self) -> bool {
        self.kind == StreamKind::Image || self.video.as_ref().is_some_and(|v| v.is_image)
    }
}

/// The hierarchy of streams found in one media file.
///
/// The root is the container when the file has one, otherwise the single
/// top-level elementary stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamTopology {
    nodes: Vec<StreamNode>,
    root: Option<NodeId>,
}

impl StreamTopology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node; the first one added becomes the root.
    pub fn add_root(&mut self, node: StreamNode) -> NodeId {
        let id = self.push(node);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Add a node under a container node.
    pub fn add_child(&mut self, parent: NodeId, mut node: StreamNode) -> NodeId {
        node.previous = Some(parent);
        let id = self.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Chain a node after another (parse → decode chains).
    pub fn add_next(&mut self, previous: NodeId, mut node: StreamNode) -> NodeId {
        node.previous = Some(previous);
        let id = self.push(node);
        self.nodes[previous].next = Some(id);
        id
    }

    fn push(&mut self, node: StreamNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// The top-level stream, if any.
    pub fn root(&self) -> Option<&StreamNode> {
        self.root.map(|id| &self.nodes[id])
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> &[StreamNode] {
        &self.nodes
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&StreamNode> {
        self.nodes.get(id)
    }

    /// All nodes of one kind, in insertion order.
    pub fn streams_of_kind(&self, kind: StreamKind) -> Vec<&StreamNode> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }
}

/// Everything the inspector discovered about one URI.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    /// The inspected URI.
    pub uri: String,
    /// Stream hierarchy.
    pub topology: StreamTopology,
    /// Overall duration, when known.
    pub duration: Option<Duration>,
    /// Global (non-stream) tags.
    pub tags: Vec<(String, Value)>,
}

impl MediaInfo {
    /// Create an info record for a URI with the given topology.
    pub fn new(uri: impl Into<String>, topology: StreamTopology) -> Self {
        Self {
            uri: uri.into(),
            topology,
            duration: None,
            tags: Vec::new(),
        }
    }

    /// Set the overall duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// The audio streams, in discovery order.
    pub fn audio_streams(&self) -> Vec<&StreamNode> {
        self.topology.streams_of_kind(StreamKind::Audio)
    }

    /// The video streams (still images included), in discovery order.
    pub fn video_streams(&self) -> Vec<&StreamNode> {
        self.topology
            .nodes()
            .iter()
            .filter(|n| matches!(n.kind, StreamKind::Video | StreamKind::Image))
            .collect()
    }
}

/// Overall classification of a media file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaCategory {
    /// Audio-only media.
    Audio,
    /// Video media (usually with audio).
    Video,
    /// A still image.
    Image,
    /// Nothing recognizable.
    Unknown,
}

/// Classify discovered media as audio, video, or image.
///
/// A single video stream flagged as a still image makes the whole file an
/// image; any other video stream makes it a video; otherwise any audio
/// stream makes it audio.
pub fn classify(info: &MediaInfo) -> MediaCategory {
    let videos = info.video_streams();
    if !videos.is_empty() {
        if videos.len() == 1 && videos[0].is_image() {
            MediaCategory::Image
        } else {
            MediaCategory::Video
        }
    } else if !info.audio_streams().is_empty() {
        MediaCategory::Audio
    } else {
        MediaCategory::Unknown
    }
}

/// The negotiated caps of an audio stream with its measured parameters
/// folded in as regular fields.
pub fn enriched_audio_caps(node: &StreamNode) -> Caps {
    let mut caps = node.caps.clone();
    let Some(st) = caps.first_mut() else {
        return caps;
    };
    if let Some(audio) = &node.audio {
        if let Some(rate) = audio.sample_rate {
            st.set("rate", Value::Int(rate as i64));
        }
        if let Some(channels) = audio.channels {
            st.set("channels", Value::Int(channels as i64));
        }
        if let Some(bitrate) = audio.bitrate {
            st.set("bitrate", Value::Int(bitrate as i64));
        }
        if let Some(max_bitrate) = audio.max_bitrate {
            st.set("maximum-bitrate", Value::Int(max_bitrate as i64));
        }
        if let Some(depth) = audio.depth {
            st.set("depth", Value::Int(depth as i64));
        }
    }
    caps
}

/// The negotiated caps of a video/image stream with its measured
/// parameters folded in as regular fields.
///
/// Bitrate fields come from the stream's tags when present.
pub fn enriched_video_caps(node: &StreamNode) -> Caps {
    let mut caps = node.caps.clone();
    let Some(st) = caps.first_mut() else {
        return caps;
    };
    if let Some(video) = &node.video {
        if let Some(height) = video.height {
            st.set("height", Value::Int(height as i64));
        }
        if let Some(width) = video.width {
            st.set("width", Value::Int(width as i64));
        }
        if let Some(depth) = video.depth {
            st.set("depth", Value::Int(depth as i64));
        }
        if let Some(framerate) = video.framerate {
            st.set("framerate", Value::Fraction(framerate));
        }
        if let Some(par) = video.pixel_aspect_ratio {
            st.set("pixel-aspect-ratio", Value::Fraction(par));
        }
        if video.interlaced {
            st.set("interlaced", Value::Bool(true));
        }
    }
    if let Some(Value::Int(bitrate)) = node.tag("bitrate") {
        st.set("bitrate", Value::Int(*bitrate));
    }
    if let Some(Value::Int(max_bitrate)) = node.tag("maximum-bitrate") {
        st.set("maximum-bitrate", Value::Int(*max_bitrate));
    }
    caps
}

/// The external stream-discovery service.
///
/// Implementations drive whatever pipeline machinery is needed to inspect
/// `uri` and report its stream topology, honoring `timeout`. The core
/// never blocks on anything else.
pub trait MetadataInspector {
    /// Gather stream metadata for a URI.
    fn inspect(&self, uri: &Url, timeout: Duration) -> Result<MediaInfo, DiscoveryError>;
}

/// The DLNA classification of one URI: profile name and MIME type, bundled
/// with the discovery output they were derived from.
#[derive(Clone, Debug)]
pub struct DlnaInformation {
    /// Matched profile name, empty if the media matched no profile.
    pub name: String,
    /// Matched MIME type, empty if the media matched no profile.
    pub mime: String,
    /// The metadata the match was computed from.
    pub info: MediaInfo,
}

impl DlnaInformation {
    /// True if a profile matched. An unmatched result is still a valid
    /// outcome ("unclassified media"), not an error.
    pub fn is_matched(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Discovers DLNA profile, MIME type and stream metadata for URIs.
///
/// Wraps a [`MetadataInspector`] and a profile [`Catalog`]: each inspected
/// URI's streams are matched against the catalog and the result is
/// returned as [`DlnaInformation`].
pub struct Discoverer<I> {
    inspector: I,
    catalog: Catalog,
    timeout: Duration,
    queue: VecDeque<Url>,
}

impl<I: MetadataInspector> Discoverer<I> {
    /// Create a discoverer with the given inspection timeout.
    pub fn new(inspector: I, catalog: Catalog, timeout: Duration) -> Self {
        Self {
            inspector,
            catalog,
            timeout,
            queue: VecDeque::new(),
        }
    }

    /// The catalog this discoverer matches against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Look a profile up by name.
    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.catalog.get(name)
    }

    /// All profiles this discoverer can match, in priority order.
    pub fn list_profiles(&self) -> &[Profile] {
        self.catalog.profiles()
    }

    /// Synchronously gather metadata for a URI and match it.
    pub fn discover_uri_sync(&self, uri: &str) -> Result<DlnaInformation, DiscoveryError> {
        let url = parse_uri(uri)?;
        let info = self.inspector.inspect(&url, self.timeout)?;
        Ok(self.matched_information(info))
    }

    /// Queue a URI for later processing by [`process_queue`](Self::process_queue).
    pub fn queue_uri(&mut self, uri: &str) -> Result<(), DiscoveryError> {
        let url = parse_uri(uri)?;
        self.queue.push_back(url);
        Ok(())
    }

    /// Process queued URIs one at a time, in FIFO order.
    ///
    /// `done` is invoked once per URI with either the discovery result or
    /// the discovery error; the matcher is never consulted for failed
    /// discoveries.
    pub fn process_queue(&mut self, mut done: impl FnMut(Result<DlnaInformation, DiscoveryError>)) {
        while let Some(url) = self.queue.pop_front() {
            let result = self
                .inspector
                .inspect(&url, self.timeout)
                .map(|info| self.matched_information(info));
            done(result);
        }
    }

    fn matched_information(&self, info: MediaInfo) -> DlnaInformation {
        match guess_profile(&info, &self.catalog) {
            Some(profile) => DlnaInformation {
                name: profile.name().to_string(),
                mime: profile.mime().to_string(),
                info,
            },
            None => DlnaInformation {
                name: String::new(),
                mime: String::new(),
                info,
            },
        }
    }
}

fn parse_uri(uri: &str) -> Result<Url, DiscoveryError> {
    Url::parse(uri).map_err(|err| DiscoveryError::InvalidUri(format!("{uri}: {err}")))
}
