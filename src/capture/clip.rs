//! Finalized audio payloads and container-format negotiation.
//!
//! A clip is the immutable result of one recording session: encoded bytes
//! plus the container format that was negotiated when the session started.
//! Negotiation probes an ordered preference list and falls back to WAV,
//! which is always encodable via hound; it never fails.

use std::io::Cursor;

/// Container/codec for a finalized clip, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    WebmOpus,
    Webm,
    OggOpus,
    Ogg,
    Wav,
}

impl ClipFormat {
    /// Preference order used during negotiation. Mirrors the upload
    /// formats the transcription providers accept, best-compressed first.
    pub const PREFERENCE: [ClipFormat; 5] = [
        ClipFormat::WebmOpus,
        ClipFormat::Webm,
        ClipFormat::OggOpus,
        ClipFormat::Ogg,
        ClipFormat::Wav,
    ];

    /// MIME type for HTTP uploads.
    pub fn mime(&self) -> &'static str {
        match self {
            ClipFormat::WebmOpus => "audio/webm;codecs=opus",
            ClipFormat::Webm => "audio/webm",
            ClipFormat::OggOpus => "audio/ogg;codecs=opus",
            ClipFormat::Ogg => "audio/ogg",
            ClipFormat::Wav => "audio/wav",
        }
    }

    /// File name extension used when naming multipart upload parts.
    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::WebmOpus | ClipFormat::Webm => "webm",
            ClipFormat::OggOpus | ClipFormat::Ogg => "ogg",
            ClipFormat::Wav => "wav",
        }
    }

    /// Whether an encoder for this format is linked into the binary.
    /// Only WAV ships today; opus containers stay in the preference list
    /// so negotiation picks them up when an encoder is added.
    fn encoder_available(&self) -> bool {
        matches!(self, ClipFormat::Wav)
    }

    /// Picks the first encodable format from the preference list. WAV is
    /// the unconditional fallback, so this cannot fail.
    pub fn negotiate() -> ClipFormat {
        let format = Self::PREFERENCE
            .iter()
            .copied()
            .find(ClipFormat::encoder_available)
            .unwrap_or(ClipFormat::Wav);
        tracing::debug!("Negotiated clip format: {}", format.mime());
        format
    }
}

/// An immutable, finalized audio recording.
#[derive(Debug, Clone)]
pub struct AudioClip {
    bytes: Vec<u8>,
    format: ClipFormat,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, format: ClipFormat) -> Self {
        Self { bytes, format }
    }

    /// Encodes mono i16 PCM samples into an in-memory WAV clip.
    ///
    /// Encoding into a `Cursor<Vec<u8>>` cannot hit I/O errors, so a
    /// failure here means a hound invariant was violated and is reported
    /// as an empty clip rather than unwinding the stop path.
    pub fn from_pcm(samples: &[i16], sample_rate: u32) -> Self {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let encoded = (|| -> Result<Vec<u8>, hound::Error> {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
            Ok(cursor.into_inner())
        })();

        match encoded {
            Ok(bytes) => Self::new(bytes, ClipFormat::Wav),
            Err(e) => {
                tracing::error!("WAV encoding failed: {}", e);
                Self::empty()
            }
        }
    }

    /// A zero-byte clip, returned by idempotent stops with nothing
    /// recorded.
    pub fn empty() -> Self {
        Self::new(Vec::new(), ClipFormat::Wav)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ClipFormat {
        self.format
    }

    /// Payload size in bytes, as compared against the controller's
    /// minimum-size gate.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_always_yields_an_encodable_format() {
        let format = ClipFormat::negotiate();
        assert!(format.encoder_available());
    }

    #[test]
    fn negotiation_prefers_earlier_supported_entries() {
        // With only the WAV encoder linked, the probe walks the whole
        // preference list and lands on the fallback.
        assert_eq!(ClipFormat::negotiate(), ClipFormat::Wav);
    }

    #[test]
    fn pcm_clip_carries_wav_header_and_samples() {
        let clip = AudioClip::from_pcm(&[0i16; 8000], 16000);
        // 44-byte RIFF header plus two bytes per sample.
        assert_eq!(clip.len(), 44 + 16000);
        assert_eq!(clip.format(), ClipFormat::Wav);
        assert_eq!(&clip.bytes()[..4], b"RIFF");
    }

    #[test]
    fn empty_clip_is_empty() {
        assert!(AudioClip::empty().is_empty());
        assert_eq!(AudioClip::empty().len(), 0);
    }
}
