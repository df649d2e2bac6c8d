use anyhow::Result;
use base64::Engine;
use loqa_assist::reassembly::{IncomingChunk, StreamKey, StreamReassembler};
use loqa_assist::transport::AudioChunkMessage;
use std::sync::Arc;
use std::time::Duration;

fn chunk(stream_id: &str, index: u32, total: u32, is_last: bool, payload: &[u8]) -> IncomingChunk {
    IncomingChunk {
        device_id: "esp32-01".to_string(),
        stream_id: stream_id.to_string(),
        chunk_index: index,
        total_chunks: total,
        is_last,
        format: "pcm16le".to_string(),
        sample_rate: 16000,
        payload: payload.to_vec(),
    }
}

fn parts() -> Vec<Vec<u8>> {
    (0..5u8).map(|i| vec![i; 4]).collect()
}

#[test]
fn test_in_order_upload() {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));
    let parts = parts();

    for (i, part) in parts.iter().enumerate().take(4) {
        assert!(reassembler.accept(chunk("s1", i as u32, 5, false, part)).is_none());
    }
    let completed = reassembler
        .accept(chunk("s1", 4, 5, true, &parts[4]))
        .expect("upload should complete");

    assert_eq!(completed.audio, parts.concat());
    assert_eq!(completed.total_chunks, 5);
    assert!(completed.is_complete());
    assert_eq!(reassembler.active_streams(), 0);
}

#[test]
fn test_reverse_order_matches_in_order() {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));
    let parts = parts();

    let mut completed = None;
    for i in (0..5u32).rev() {
        completed = reassembler.accept(chunk("s2", i, 5, false, &parts[i as usize]));
        if i > 0 {
            assert!(completed.is_none(), "completed early at chunk {}", i);
        }
    }

    let completed = completed.expect("all chunks received");
    assert_eq!(completed.audio, parts.concat());
    assert!(completed.missing.is_empty());
}

#[test]
fn test_duplicate_chunk_is_idempotent() {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));
    let key = StreamKey::new("esp32-01", "s3");

    reassembler.accept(chunk("s3", 0, 3, false, b"aa"));
    reassembler.accept(chunk("s3", 0, 3, false, b"aa"));
    assert_eq!(reassembler.received_count(&key), Some(1));

    reassembler.accept(chunk("s3", 1, 3, false, b"bb"));
    reassembler.accept(chunk("s3", 1, 3, false, b"bb"));
    assert_eq!(reassembler.received_count(&key), Some(2));

    let completed = reassembler.accept(chunk("s3", 2, 3, false, b"cc")).unwrap();
    assert_eq!(completed.audio, b"aabbcc");
}

#[test]
fn test_last_chunk_with_gap_completes_best_effort() {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));

    reassembler.accept(chunk("s4", 0, 4, false, b"00"));
    reassembler.accept(chunk("s4", 2, 4, false, b"22"));
    let completed = reassembler.accept(chunk("s4", 3, 4, true, b"33")).unwrap();

    assert_eq!(completed.audio, b"002233");
    assert_eq!(completed.missing, vec![1]);
    assert!(!completed.is_complete());
}

#[test]
fn test_streams_are_keyed_per_device() {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));

    let mut other = chunk("same", 0, 2, false, b"xx");
    other.device_id = "esp32-02".to_string();

    reassembler.accept(chunk("same", 0, 2, false, b"aa"));
    reassembler.accept(other);
    assert_eq!(reassembler.active_streams(), 2);

    let completed = reassembler.accept(chunk("same", 1, 2, false, b"bb")).unwrap();
    assert_eq!(completed.audio, b"aabb");
    assert_eq!(reassembler.active_streams(), 1);
}

#[test]
fn test_chunk_from_wire_message() -> Result<()> {
    let json = format!(
        r#"{{"streamId": 17, "chunkIndex": 0, "totalChunks": 1, "isLast": true, "data": "{}"}}"#,
        base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3])
    );
    let msg: AudioChunkMessage = serde_json::from_str(&json)?;
    let chunk = IncomingChunk::from_message("esp32-01", &msg)?;

    assert_eq!(chunk.stream_id, "17");
    assert_eq!(chunk.format, "pcm16le");
    assert_eq!(chunk.sample_rate, 16000);
    assert_eq!(chunk.payload, vec![1, 2, 3]);

    let mut bad = msg.clone();
    bad.data = "***".to_string();
    assert!(IncomingChunk::from_message("esp32-01", &bad).is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_is_swept() -> Result<()> {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));
    reassembler.accept(chunk("s5", 0, 3, false, b"aa"));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(reassembler.sweep_expired().is_empty());

    tokio::time::advance(Duration::from_secs(2)).await;
    let expired = reassembler.sweep_expired();
    assert_eq!(expired, vec![StreamKey::new("esp32-01", "s5")]);
    assert_eq!(reassembler.active_streams(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_activity_keeps_session_alive() -> Result<()> {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));
    reassembler.accept(chunk("s6", 0, 3, false, b"aa"));

    tokio::time::advance(Duration::from_secs(45)).await;
    reassembler.accept(chunk("s6", 1, 3, false, b"bb"));
    tokio::time::advance(Duration::from_secs(45)).await;

    assert!(reassembler.sweep_expired().is_empty());
    assert_eq!(reassembler.active_streams(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_background_sweeper() -> Result<()> {
    let reassembler = Arc::new(StreamReassembler::with_timeout(Duration::from_secs(60)));
    let sweeper = reassembler.spawn_sweeper(Duration::from_secs(30));

    reassembler.accept(chunk("s7", 0, 2, false, b"aa"));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(reassembler.active_streams(), 1, "not idle long enough at the 60s sweep");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(reassembler.active_streams(), 0);

    sweeper.abort();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_late_redelivery_is_not_completed_twice() -> Result<()> {
    let reassembler = StreamReassembler::with_timeout(Duration::from_secs(60));

    assert!(reassembler.accept(chunk("s8", 0, 1, true, b"aa")).is_some());

    // The device retries the same single-chunk upload
    assert!(reassembler.accept(chunk("s8", 0, 1, true, b"aa")).is_none());
    assert_eq!(reassembler.active_streams(), 0);

    // Once forgotten by the sweep, the stream id can be reused
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(reassembler.sweep_expired().is_empty());
    assert!(reassembler.accept(chunk("s8", 0, 1, true, b"bb")).is_some());

    Ok(())
}
