//! Profile matching.
//!
//! [`guess_profile`] maps discovered media onto the first catalog profile
//! whose restrictions it satisfies. A restriction is satisfied when the
//! stream's enriched caps can intersect one of the restriction's
//! alternative structures *and* carry every field that structure declares:
//! a restriction naming a field the stream never reports is rejected even
//! if all other fields match.
//!
//! The catalog is scanned in insertion order and the first satisfying
//! profile wins; there is no scoring or backtracking. Finding no profile
//! is a valid outcome, not an error.

use crate::caps::Caps;
use crate::catalog::Catalog;
use crate::discovery::{
    classify, enriched_audio_caps, enriched_video_caps, MediaCategory, MediaInfo, StreamNode,
};
use crate::profile::{Profile, StreamKind};

/// Find the first catalog profile matching the discovered media.
pub fn guess_profile<'a>(info: &MediaInfo, catalog: &'a Catalog) -> Option<&'a Profile> {
    match classify(info) {
        MediaCategory::Image => guess_image_profile(info.video_streams()[0], catalog),
        MediaCategory::Video => guess_video_profile(info, catalog),
        MediaCategory::Audio => guess_audio_profile(info, catalog),
        MediaCategory::Unknown => None,
    }
}

fn guess_audio_profile<'a>(info: &MediaInfo, catalog: &'a Catalog) -> Option<&'a Profile> {
    for profile in catalog.profiles() {
        tracing::debug!(profile = %profile.name(), "checking DLNA profile");
        if !check_audio_profile(info, profile) {
            tracing::debug!("  audio did not match");
        } else if !check_container(info, profile) {
            tracing::debug!("  container did not match");
        } else {
            return Some(profile);
        }
    }
    None
}

fn guess_video_profile<'a>(info: &MediaInfo, catalog: &'a Catalog) -> Option<&'a Profile> {
    catalog.profiles().iter().find(|profile| {
        tracing::debug!(profile = %profile.name(), "checking DLNA profile");
        check_video_profile(info, profile)
    })
}

fn guess_image_profile<'a>(stream: &StreamNode, catalog: &'a Catalog) -> Option<&'a Profile> {
    let caps = enriched_video_caps(stream);
    catalog.profiles().iter().find(|profile| {
        // Image restrictions live alongside video ones; a profile with a
        // true video stream profile is never an image profile.
        !profile.has_video_stream()
            && match_profile(profile, &caps, &[StreamKind::Video, StreamKind::Image])
    })
}

/// Check a profile's audio restriction against the discovered audio
/// streams. Profiles restricting a video stream are not audio profiles.
fn check_audio_profile(info: &MediaInfo, profile: &Profile) -> bool {
    if profile.has_video_stream() {
        return false;
    }
    info.audio_streams()
        .iter()
        .any(|stream| match_profile(profile, &enriched_audio_caps(stream), &[StreamKind::Audio]))
}

/// Check a profile's video and audio restrictions, then its container.
fn check_video_profile(info: &MediaInfo, profile: &Profile) -> bool {
    let found_video = info
        .video_streams()
        .iter()
        .any(|stream| match_profile(profile, &enriched_video_caps(stream), &[StreamKind::Video]));
    if !found_video {
        tracing::debug!("  video did not match");
        return false;
    }

    let found_audio = info
        .audio_streams()
        .iter()
        .any(|stream| match_profile(profile, &enriched_audio_caps(stream), &[StreamKind::Audio]));
    if !found_audio {
        tracing::debug!("  audio did not match");
        return false;
    }

    if !check_container(info, profile) {
        tracing::debug!("  container did not match");
        return false;
    }
    true
}

/// Container compatibility: a discovered container stream must intersect
/// the profile's container caps; a container-less discovery only fits
/// profiles that declare no container.
fn check_container(info: &MediaInfo, profile: &Profile) -> bool {
    match info.topology.root() {
        Some(root) if root.kind == StreamKind::Container => {
            root.caps.can_intersect(profile.container())
        }
        _ => profile.container().is_empty(),
    }
}

/// Check the stream's caps against the profile's restriction entries of
/// the given kinds.
fn match_profile(profile: &Profile, caps: &Caps, kinds: &[StreamKind]) -> bool {
    // Profiles with an empty name are used only for inheritance and must
    // not be matched against.
    if profile.is_anonymous() {
        return false;
    }
    profile
        .streams()
        .iter()
        .filter(|stream| kinds.contains(&stream.kind))
        .any(|stream| caps_can_intersect_and_is_subset(caps, &stream.caps))
}

/// True if the stream caps intersect one of the restriction's alternative
/// structures and that structure's fields are all present on the stream:
/// every field the restriction declares must be measurable on the actual
/// stream, and the measured values must be compatible.
fn caps_can_intersect_and_is_subset(stream_caps: &Caps, profile_caps: &Caps) -> bool {
    let Some(stream_st) = stream_caps.first() else {
        return false;
    };
    profile_caps
        .structures()
        .iter()
        .any(|profile_st| stream_st.can_intersect(profile_st) && stream_st.has_all_fields_of(profile_st))
}
