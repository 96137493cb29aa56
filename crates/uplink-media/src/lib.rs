//! # uplink-media
//!
//! The media side of a streaming session, expressed as capabilities the
//! negotiation logic drives:
//!
//! - [`MediaTransport`] / [`PeerSession`]: peer connection factory and the
//!   session it creates per offer.
//! - [`CaptureDriver`]: starts and stops the camera feed.
//! - [`DeviceControl`]: releases the camera before streaming and gives it
//!   back afterwards.
//! - [`PreviewSink`]: local rendering of the outgoing video.
//!
//! With the `webrtc-rs` feature [`WebRtcTransport`] backs
//! the transport with the `webrtc` crate.

pub mod capture;
pub mod device;
pub mod error;
pub mod preview;
pub mod transport;
#[cfg(feature = "webrtc-rs")]
pub mod rtc;

pub use capture::{CaptureDriver, ProcessCapture};
pub use device::{CommandHooks, DeviceControl};
pub use error::{MediaError, Result};
pub use preview::{HeadlessPreview, PreviewSink};
pub use transport::{
    AudioSource, CandidateSink, LocalStream, MediaTrack, MediaTransport, PeerSession, TrackKind, VideoSource,
};
#[cfg(feature = "webrtc-rs")]
pub use rtc::{RtpSettings, WebRtcTransport};
