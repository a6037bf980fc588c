use std::fmt;

use crate::models::Rect;

/// Media families the panel can display. Each is served by its own batch
/// endpoint on the tracking server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Audio,
    Figure,
}

impl MediaKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "image" | "images" => Some(Self::Image),
            "audio" | "audios" => Some(Self::Audio),
            "figure" | "figures" => Some(Self::Figure),
            _ => None,
        }
    }

    /// Path of the POST endpoint that streams blobs for a list of URIs.
    pub fn batch_endpoint(&self) -> &'static str {
        match self {
            Self::Image => "/runs/images/get-batch/",
            Self::Audio => "/runs/audios/get-batch/",
            Self::Figure => "/runs/figures/get-batch/",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "images",
            Self::Audio => "audios",
            Self::Figure => "figures",
        };
        f.write_str(name)
    }
}

/// A rendered media item under the pointer.
///
/// `key` identifies the item within the panel, `seq_key` the sequence
/// (run + context) it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverTarget {
    pub key: String,
    pub seq_key: String,
    pub rect: Rect,
}

impl HoverTarget {
    pub fn new(key: impl Into<String>, seq_key: impl Into<String>, rect: Rect) -> Self {
        Self {
            key: key.into(),
            seq_key: seq_key.into(),
            rect,
        }
    }
}
