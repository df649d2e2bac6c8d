use std::io::Cursor;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Short format name for a `Content-Type` header value
pub fn format_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();

    match mime {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/pcm" | "audio/l16" => Some("pcm16le"),
        _ => None,
    }
}

/// Read the sample rate from an encoded audio container
pub fn sample_rate_of(bytes: &[u8], extension: Option<&str>) -> Option<u32> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = match symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(e) => {
            debug!("Could not probe synthesized audio: {}", e);
            return None;
        }
    };

    probed
        .format
        .default_track()
        .and_then(|track| track.codec_params.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_pcm16le;

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(format_from_content_type("audio/mpeg"), Some("mp3"));
        assert_eq!(format_from_content_type("audio/wav; charset=binary"), Some("wav"));
        assert_eq!(format_from_content_type("application/json"), None);
    }

    #[test]
    fn test_probe_wav_sample_rate() {
        let pcm: Vec<u8> = (0..2205i16).flat_map(|s| s.to_le_bytes()).collect();
        let wav = encode_pcm16le(&pcm, 22050).unwrap();

        assert_eq!(sample_rate_of(&wav, Some("wav")), Some(22050));
    }

    #[test]
    fn test_probe_garbage_is_none() {
        assert_eq!(sample_rate_of(b"definitely not audio", None), None);
    }
}
