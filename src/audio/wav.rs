use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::reassembly::CompletedStream;

/// Format tag devices use for raw little-endian 16-bit mono PCM
pub const PCM16LE: &str = "pcm16le";

/// Wrap raw 16-bit little-endian mono PCM in a WAV container
pub fn encode_pcm16le(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create in-memory WAV writer")?;

        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}

/// Audio bytes ready to hand to a speech service, with a file name hint
pub fn upload_file(stream: &CompletedStream) -> Result<(Vec<u8>, String)> {
    if stream.format.eq_ignore_ascii_case(PCM16LE) {
        let wav = encode_pcm16le(&stream.audio, stream.sample_rate)?;
        Ok((wav, "audio.wav".to_string()))
    } else {
        Ok((stream.audio.clone(), format!("audio.{}", stream.format)))
    }
}

/// Persist a completed upload under `dir` as `{device}-{stream}.{ext}`
pub fn save_upload(dir: impl AsRef<Path>, stream: &CompletedStream) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create recordings directory: {:?}", dir))?;

    let (bytes, file_name) = upload_file(stream)?;
    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");

    let path = dir.join(format!(
        "{}-{}.{}",
        sanitize(&stream.device_id),
        sanitize(&stream.stream_id),
        extension
    ));

    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write audio file: {:?}", path))?;

    info!("Saved audio file: {}", path.display());

    Ok(path)
}

/// Keep only filename-safe characters
pub(crate) fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
