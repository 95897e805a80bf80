use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Appends raw session audio to a WAV file alongside the transport send path.
///
/// Recording is an independent failure domain: a write failure stops the
/// recording (logged, writer dropped) but never the transcription session.
pub struct RecordingWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    failed: bool,
    samples_written: u64,
}

impl RecordingWriter {
    /// Create the recording file for a session.
    ///
    /// Parent directories are created as needed.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create recording directory")?;
        }

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create recording file: {:?}", path))?;

        info!("Recording to {:?} ({} Hz, {} ch)", path, sample_rate, channels);

        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            failed: false,
            samples_written: 0,
        })
    }

    /// Append little-endian PCM16 bytes.
    ///
    /// After the first write failure this becomes a no-op.
    pub fn append_pcm(&mut self, pcm: &[u8]) {
        let Some(writer) = &mut self.writer else {
            return;
        };

        for sample_bytes in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([sample_bytes[0], sample_bytes[1]]);
            if let Err(e) = writer.write_sample(sample) {
                error!("Recording write failed, stopping recording: {}", e);
                self.failed = true;
                self.writer = None;
                return;
            }
            self.samples_written += 1;
        }

        if pcm.len() % 2 != 0 {
            warn!("Odd-length PCM frame, trailing byte ignored");
        }
    }

    /// Flush and finalize the WAV header.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .with_context(|| format!("Failed to finalize recording: {:?}", self.path))?;
            info!(
                "Recording finalized: {:?} ({} samples)",
                self.path, self.samples_written
            );
        }
        Ok(())
    }

    /// Whether recording stopped because of a write failure.
    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize recording on drop: {}", e);
            }
        }
    }
}
