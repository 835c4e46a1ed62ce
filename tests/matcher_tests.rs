//! End-to-end matching tests: profiles loaded from real documents,
//! discovered media built through the discovery model, matched through
//! the public API.

use medialens::caps::{Caps, Structure, Value};
use medialens::catalog::Catalog;
use medialens::discovery::{
    AudioStreamInfo, Discoverer, MediaInfo, MetadataInspector, StreamNode, StreamTopology,
    VideoStreamInfo,
};
use medialens::error::DiscoveryError;
use medialens::matcher::guess_profile;
use medialens::profile::StreamKind;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

/// A small but realistic profile set: an audio profile, an A/V profile in
/// a container, and an image profile.
const PROFILES: &str = r#"<?xml version="1.0"?>
<dlna-profiles>
  <restrictions>
    <restriction id="mp3-stream" type="audio">
      <field name="name" type="string">
        <value>audio/mpeg</value>
      </field>
      <field name="mpegversion" type="int">
        <value>1</value>
      </field>
      <field name="layer" type="int">
        <value>3</value>
      </field>
      <field name="channels" type="int">
        <value>1</value>
        <value>2</value>
      </field>
    </restriction>
  </restrictions>

  <dlna-profile name="MP3" mime="audio/mpeg">
    <parent name="mp3-stream"/>
  </dlna-profile>

  <dlna-profile name="MPEG_PS_PAL" mime="video/mpeg">
    <restriction type="container">
      <field name="name" type="string">
        <value>video/mpeg</value>
      </field>
      <field name="systemstream" type="boolean">
        <value>true</value>
      </field>
    </restriction>
    <restriction type="video">
      <field name="name" type="string">
        <value>video/mpeg</value>
      </field>
      <field name="width" type="int">
        <value>720</value>
      </field>
      <field name="height" type="int">
        <value>576</value>
      </field>
    </restriction>
    <restriction type="audio">
      <field name="name" type="string">
        <value>audio/mpeg</value>
      </field>
    </restriction>
  </dlna-profile>

  <dlna-profile name="JPEG_MED" mime="image/jpeg">
    <restriction type="image">
      <field name="name" type="string">
        <value>image/jpeg</value>
      </field>
      <field name="width" type="int">
        <range min="0" max="4096"/>
      </field>
      <field name="height" type="int">
        <range min="0" max="4096"/>
      </field>
    </restriction>
  </dlna-profile>
</dlna-profiles>
"#;

fn test_catalog() -> (TempDir, Catalog) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("profiles.xml"), PROFILES).unwrap();
    let catalog = Catalog::load(dir.path());
    assert_eq!(catalog.len(), 3);
    (dir, catalog)
}

fn mp3_node() -> StreamNode {
    StreamNode::new(
        StreamKind::Audio,
        Caps::new(
            Structure::new("audio/mpeg")
                .with_field("mpegversion", Value::Int(1))
                .with_field("layer", Value::Int(3)),
        ),
    )
    .with_audio(AudioStreamInfo {
        channels: Some(2),
        sample_rate: Some(44100),
        ..Default::default()
    })
}

fn mp3_info() -> MediaInfo {
    let mut topology = StreamTopology::new();
    topology.add_root(mp3_node());
    MediaInfo::new("file:///music/song.mp3", topology)
}

fn pal_movie_info() -> MediaInfo {
    let mut topology = StreamTopology::new();
    let root = topology.add_root(StreamNode::new(
        StreamKind::Container,
        Caps::new(
            Structure::new("video/mpeg")
                .with_field("systemstream", Value::Bool(true))
                .with_field("mpegversion", Value::Int(2)),
        ),
    ));
    topology.add_child(
        root,
        StreamNode::new(
            StreamKind::Video,
            Caps::new(Structure::new("video/mpeg").with_field("mpegversion", Value::Int(2))),
        )
        .with_video(VideoStreamInfo {
            width: Some(720),
            height: Some(576),
            framerate: Some(medialens::caps::Fraction::new(25, 1)),
            ..Default::default()
        }),
    );
    topology.add_child(root, mp3_node());
    MediaInfo::new("file:///video/movie.mpg", topology)
}

fn photo_info() -> MediaInfo {
    let mut topology = StreamTopology::new();
    topology.add_root(
        StreamNode::new(StreamKind::Video, Caps::new(Structure::new("image/jpeg"))).with_video(
            VideoStreamInfo {
                width: Some(1024),
                height: Some(768),
                is_image: true,
                ..Default::default()
            },
        ),
    );
    MediaInfo::new("file:///photos/photo.jpg", topology)
}

#[test]
fn test_audio_stream_matches_mp3() {
    let (_dir, catalog) = test_catalog();
    let matched = guess_profile(&mp3_info(), &catalog).unwrap();
    assert_eq!(matched.name(), "MP3");
    assert_eq!(matched.mime(), "audio/mpeg");
}

#[test]
fn test_av_stream_matches_container_profile() {
    let (_dir, catalog) = test_catalog();
    let matched = guess_profile(&pal_movie_info(), &catalog).unwrap();
    assert_eq!(matched.name(), "MPEG_PS_PAL");
}

#[test]
fn test_image_matches_image_profile() {
    let (_dir, catalog) = test_catalog();
    let matched = guess_profile(&photo_info(), &catalog).unwrap();
    assert_eq!(matched.name(), "JPEG_MED");
    assert_eq!(matched.mime(), "image/jpeg");
}

#[test]
fn test_oversized_image_is_unclassified() {
    let (_dir, catalog) = test_catalog();
    let mut topology = StreamTopology::new();
    topology.add_root(
        StreamNode::new(StreamKind::Video, Caps::new(Structure::new("image/jpeg"))).with_video(
            VideoStreamInfo {
                width: Some(8192),
                height: Some(6144),
                is_image: true,
                ..Default::default()
            },
        ),
    );
    let info = MediaInfo::new("file:///photos/huge.jpg", topology);
    assert!(guess_profile(&info, &catalog).is_none());
}

#[test]
fn test_wrong_codec_is_unclassified() {
    let (_dir, catalog) = test_catalog();
    let mut topology = StreamTopology::new();
    topology.add_root(
        StreamNode::new(
            StreamKind::Audio,
            Caps::new(Structure::new("audio/x-vorbis")),
        )
        .with_audio(AudioStreamInfo {
            channels: Some(2),
            ..Default::default()
        }),
    );
    let info = MediaInfo::new("file:///music/song.ogg", topology);
    assert!(guess_profile(&info, &catalog).is_none());
}

#[test]
fn test_six_channel_mp3_is_rejected() {
    let (_dir, catalog) = test_catalog();
    let mut topology = StreamTopology::new();
    let mut node = mp3_node();
    node.audio = Some(AudioStreamInfo {
        channels: Some(6),
        sample_rate: Some(44100),
        ..Default::default()
    });
    topology.add_root(node);
    let info = MediaInfo::new("file:///music/surround.mp3", topology);
    assert!(guess_profile(&info, &catalog).is_none());
}

// ============================================================================
// Discoverer service
// ============================================================================

struct MapInspector;

impl MetadataInspector for MapInspector {
    fn inspect(&self, uri: &Url, _timeout: Duration) -> Result<MediaInfo, DiscoveryError> {
        match uri.path() {
            path if path.ends_with(".mp3") => Ok(mp3_info()),
            path if path.ends_with(".mpg") => Ok(pal_movie_info()),
            path if path.ends_with(".jpg") => Ok(photo_info()),
            _ => Err(DiscoveryError::MissingPlugins(vec!["demuxer".into()])),
        }
    }
}

#[test]
fn test_discoverer_sync_matches_and_bundles_info() {
    let (_dir, catalog) = test_catalog();
    let discoverer = Discoverer::new(MapInspector, catalog, Duration::from_secs(5));

    let dlna = discoverer
        .discover_uri_sync("file:///music/song.mp3")
        .unwrap();
    assert!(dlna.is_matched());
    assert_eq!(dlna.name, "MP3");
    assert_eq!(dlna.mime, "audio/mpeg");
    assert_eq!(dlna.info.uri, "file:///music/song.mp3");
}

#[test]
fn test_discoverer_propagates_service_errors() {
    let (_dir, catalog) = test_catalog();
    let discoverer = Discoverer::new(MapInspector, catalog, Duration::from_secs(5));
    assert!(matches!(
        discoverer.discover_uri_sync("file:///mystery.bin"),
        Err(DiscoveryError::MissingPlugins(_))
    ));
}

#[test]
fn test_discoverer_queue_round() {
    let (_dir, catalog) = test_catalog();
    let mut discoverer = Discoverer::new(MapInspector, catalog, Duration::from_secs(5));
    discoverer.queue_uri("file:///photos/photo.jpg").unwrap();
    discoverer.queue_uri("file:///video/movie.mpg").unwrap();

    let mut names = Vec::new();
    discoverer.process_queue(|result| names.push(result.unwrap().name));
    assert_eq!(names, vec!["JPEG_MED", "MPEG_PS_PAL"]);
}

#[test]
fn test_discoverer_profile_lookup() {
    let (_dir, catalog) = test_catalog();
    let discoverer = Discoverer::new(MapInspector, catalog, Duration::from_secs(5));
    assert_eq!(discoverer.list_profiles().len(), 3);
    assert_eq!(
        discoverer.get_profile("MPEG_PS_PAL").map(|p| p.mime()),
        Some("video/mpeg")
    );
    assert!(discoverer.get_profile("AVC_MP4_MP").is_none());
}
