//! Audio output: sink seam and clip decoding.

mod sink;

pub use sink::CpalSink;

use crate::error::Result;
use crate::synthesis::AudioClip;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Renders one clip to the output device.
///
/// `play` returns when the clip finishes naturally or `cancel` stops it
/// early. The underlying stream and buffers are released on every exit
/// path, including cancellation and errors.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `clip` until it ends or `cancel` fires.
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<()>;
}
