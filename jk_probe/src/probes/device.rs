//! Layer 1: WebRTC stack and capture devices

use super::Outcome;
use crate::media::{MediaDevices, MediaError, MediaKind};
use crate::rtc::{IceConfig, PeerFactory};

pub async fn webrtc_support(peers: &dyn PeerFactory) -> Outcome {
    if !peers.is_available() {
        return Outcome::fail("RTCPeerConnection unavailable");
    }

    match peers.create(&IceConfig::default()).await {
        Ok(session) => {
            session.close().await;
            Outcome::pass("")
        }
        Err(e) => Outcome::fail(e.to_string()),
    }
}

pub async fn camera_mic(media: &dyn MediaDevices) -> Outcome {
    match media.request_access().await {
        Ok(()) => Outcome::pass(""),
        Err(MediaError::PermissionDenied) => Outcome::warn("Permission denied"),
        Err(e) => Outcome::fail(e.to_string()),
    }
}

pub async fn device_enum(media: &dyn MediaDevices) -> Outcome {
    let devices = match media.enumerate().await {
        Ok(devices) => devices,
        Err(e) => return Outcome::fail(e.to_string()),
    };

    let microphones = devices.iter().filter(|d| d.kind == MediaKind::AudioInput).count();
    let cameras = devices.iter().filter(|d| d.kind == MediaKind::VideoInput).count();

    match (microphones, cameras) {
        (0, 0) => Outcome::fail("No devices"),
        (0, _) => Outcome::warn("Missing microphone"),
        (_, 0) => Outcome::warn("Missing camera"),
        (a, v) => Outcome::pass(format!("{} microphone(s), {} camera(s)", a, v)),
    }
}
