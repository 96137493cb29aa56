use tracing::info;

use crate::transport::MediaTrack;

/// Local rendering target for the outgoing video track.
pub trait PreviewSink: Send + Sync {
    fn attach(&self, track: &MediaTrack);
}

/// Preview for devices without a display: records the attachment only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPreview;

impl PreviewSink for HeadlessPreview {
    fn attach(&self, track: &MediaTrack) {
        info!(track = %track.id, kind = ?track.kind, "preview attached");
    }
}
