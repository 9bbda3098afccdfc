//! Camera and microphone access
//!
//! The native implementation looks at OS device nodes. It cannot tell a
//! denied permission from a missing device on every platform, so access is
//! checked by opening the node read-only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("no capture devices found")]
    NotFound,

    #[error("media devices are not supported on this platform")]
    Unsupported,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    AudioInput,
    VideoInput,
    AudioOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDevice {
    pub kind: MediaKind,
    pub label: String,
}

impl MediaDevice {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open camera and microphone together and release them again
    async fn request_access(&self) -> Result<(), MediaError>;

    async fn enumerate(&self) -> Result<Vec<MediaDevice>, MediaError>;
}

/// Device-node backed media devices
pub struct NativeMediaDevices {
    dev_root: PathBuf,
}

impl NativeMediaDevices {
    pub fn new() -> Self {
        Self::with_root("/dev")
    }

    /// Use an alternative device directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { dev_root: root.into() }
    }

    fn scan(&self) -> Result<Vec<(MediaDevice, PathBuf)>, MediaError> {
        if !cfg!(target_os = "linux") {
            return Err(MediaError::Unsupported);
        }

        let mut devices = Vec::new();
        for entry in read_dir_sorted(&self.dev_root)? {
            let name = file_name(&entry);
            if name.starts_with("video") {
                devices.push((MediaDevice::new(MediaKind::VideoInput, name), entry));
            }
        }

        // ALSA PCM nodes: pcmC<card>D<device>c (capture) / p (playback)
        let snd = self.dev_root.join("snd");
        if snd.is_dir() {
            for entry in read_dir_sorted(&snd)? {
                let name = file_name(&entry);
                if !name.starts_with("pcmC") {
                    continue;
                }
                let kind = if name.ends_with('c') {
                    MediaKind::AudioInput
                } else if name.ends_with('p') {
                    MediaKind::AudioOutput
                } else {
                    continue;
                };
                devices.push((MediaDevice::new(kind, name), entry));
            }
        }

        Ok(devices)
    }
}

impl Default for NativeMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, MediaError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| MediaError::Other(format!("{}: {}", dir.display(), e)))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn open_node(path: &Path) -> Result<(), MediaError> {
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(MediaError::PermissionDenied),
        Err(e) => Err(MediaError::Other(format!("{}: {}", path.display(), e))),
    }
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn request_access(&self) -> Result<(), MediaError> {
        let devices = self.scan()?;
        let camera = devices.iter().find(|(d, _)| d.kind == MediaKind::VideoInput);
        let microphone = devices.iter().find(|(d, _)| d.kind == MediaKind::AudioInput);

        match (camera, microphone) {
            (Some((_, cam)), Some((_, mic))) => {
                open_node(cam)?;
                open_node(mic)
            }
            _ => Err(MediaError::NotFound),
        }
    }

    async fn enumerate(&self) -> Result<Vec<MediaDevice>, MediaError> {
        Ok(self.scan()?.into_iter().map(|(d, _)| d).collect())
    }
}
