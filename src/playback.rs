use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "playback")]
    #[error("No audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[cfg(feature = "playback")]
    #[error("Audio sink error: {0}")]
    Play(#[from] rodio::PlayError),
    #[cfg(feature = "playback")]
    #[error("Cannot decode audio: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
}

/// Blocking "play this file" primitive.
///
/// Implementations return once playback has finished.
pub trait AudioSink {
    fn play(&self, path: &Path) -> Result<(), PlaybackError>;
}

impl<T: AudioSink + ?Sized> AudioSink for Box<T> {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        (**self).play(path)
    }
}

/// Plays files on the default output device.
#[cfg(feature = "playback")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioSink;

#[cfg(feature = "playback")]
impl AudioSink for RodioSink {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        use std::fs::File;
        use std::io::BufReader;

        // The stream must outlive the sink.
        let (_stream, handle) = rodio::OutputStream::try_default()?;
        let sink = rodio::Sink::try_new(&handle)?;
        let source = rodio::Decoder::new(BufReader::new(File::open(path)?))?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}
