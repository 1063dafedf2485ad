//! Decoding, PCM streams and device output.

pub mod decode;
pub mod format;
pub mod output;
#[cfg(feature = "rodio-output")]
pub mod rodio_output;
pub mod stream;

pub use decode::{SourceDecoder, SymphoniaDecoder};
pub use format::{AudioFormat, Encoding};
pub use output::{AudioOutput, NullOutput, PlaybackLine};
#[cfg(feature = "rodio-output")]
pub use rodio_output::RodioOutput;
pub use stream::AudioStream;
