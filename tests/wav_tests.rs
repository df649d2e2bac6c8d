use anyhow::Result;
use loqa_assist::audio::{encode_pcm16le, sample_rate_of, save_upload, upload_file};
use loqa_assist::reassembly::CompletedStream;

fn upload(format: &str, audio: Vec<u8>) -> CompletedStream {
    CompletedStream {
        device_id: "esp32/01".to_string(),
        stream_id: "1700000000".to_string(),
        audio,
        format: format.to_string(),
        sample_rate: 16000,
        total_chunks: 1,
        missing: Vec::new(),
    }
}

fn sine_pcm(samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| {
            let t = i as f32 / 16000.0;
            let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16;
            sample.to_le_bytes()
        })
        .collect()
}

#[test]
fn test_pcm_is_wrapped_in_wav() -> Result<()> {
    let pcm = sine_pcm(1600);
    let wav = encode_pcm16le(&pcm, 16000)?;

    let reader = hound::WavReader::new(std::io::Cursor::new(wav.as_slice()))?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples.len(), 1600);
    assert_eq!(samples[1].to_le_bytes(), [pcm[2], pcm[3]]);

    assert_eq!(sample_rate_of(&wav, Some("wav")), Some(16000));

    Ok(())
}

#[test]
fn test_upload_file_names() -> Result<()> {
    let (bytes, name) = upload_file(&upload("pcm16le", sine_pcm(10)))?;
    assert_eq!(name, "audio.wav");
    assert_eq!(&bytes[..4], b"RIFF");

    let (bytes, name) = upload_file(&upload("opus", vec![1, 2, 3]))?;
    assert_eq!(name, "audio.opus");
    assert_eq!(bytes, vec![1, 2, 3]);

    Ok(())
}

#[test]
fn test_save_upload_sanitizes_names() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let path = save_upload(dir.path().join("recordings"), &upload("pcm16le", sine_pcm(160)))?;
    assert_eq!(path.file_name().unwrap(), "esp32_01-1700000000.wav");
    assert_eq!(hound::WavReader::open(&path)?.len(), 160);

    let path = save_upload(dir.path().join("recordings"), &upload("mp3", vec![0xff, 0xfb]))?;
    assert_eq!(path.file_name().unwrap(), "esp32_01-1700000000.mp3");
    assert_eq!(std::fs::read(path)?, vec![0xff, 0xfb]);

    Ok(())
}
