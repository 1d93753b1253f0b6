//! Frame/chunk codec
//!
//! Decodes inbound wire payloads into typed in-memory units and validates
//! encoding, size ceiling, and structural sanity. Never performs inference;
//! side-effect-free.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Duration;

use interview_engine_config::EngineConfig;
use interview_engine_core::{AudioChunk, Error, Result, VideoFrame};

/// Strip an optional `data:*;base64,` prefix sent by browser clients.
fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        match data.find(',') {
            Some(idx) => &data[idx + 1..],
            None => data,
        }
    } else {
        data
    }
}

/// Decode a base64 encoded image payload into a grayscale frame.
pub fn decode_video(data: &str, config: &EngineConfig) -> Result<VideoFrame> {
    let bytes = BASE64
        .decode(strip_data_url(data))
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(Error::Decode("empty frame payload".to_string()));
    }
    if bytes.len() > config.max_frame_bytes {
        return Err(Error::Decode(format!(
            "frame payload {} bytes exceeds ceiling {}",
            bytes.len(),
            config.max_frame_bytes
        )));
    }

    let img = image::load_from_memory(&bytes)
        .map_err(|e| Error::Decode(format!("invalid image: {}", e)))?;
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();

    if width == 0 || height == 0 {
        return Err(Error::Decode("zero-dimension image".to_string()));
    }

    Ok(VideoFrame::new(luma.into_raw(), width, height))
}

/// Decode a base64 encoded PCM16 payload into an audio chunk.
pub fn decode_audio(data: &str, duration_ms: u64, config: &EngineConfig) -> Result<AudioChunk> {
    let bytes = BASE64
        .decode(strip_data_url(data))
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(Error::Decode("empty audio payload".to_string()));
    }
    if bytes.len() > config.max_chunk_bytes {
        return Err(Error::Decode(format!(
            "audio payload {} bytes exceeds ceiling {}",
            bytes.len(),
            config.max_chunk_bytes
        )));
    }
    // PCM16: every sample is two bytes
    if bytes.len() % 2 != 0 {
        return Err(Error::Decode(
            "audio byte length not aligned to sample width".to_string(),
        ));
    }

    Ok(AudioChunk::from_pcm16(
        &bytes,
        config.audio_sample_rate,
        Duration::from_millis(duration_ms),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    fn test_config() -> EngineConfig {
        EngineConfig::default()
    }

    fn png_payload(width: u32, height: u32, value: u8) -> String {
        let img = image::GrayImage::from_pixel(width, height, image::Luma([value]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        BASE64.encode(&bytes)
    }

    #[test]
    fn test_decode_video_roundtrip() {
        let frame = decode_video(&png_payload(32, 24, 128), &test_config()).unwrap();
        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 24);
        assert_eq!(frame.luma.len(), 32 * 24);
    }

    #[test]
    fn test_decode_video_rejects_garbage() {
        assert!(matches!(
            decode_video("not-base64!!!", &test_config()),
            Err(Error::Decode(_))
        ));
        let not_an_image = BASE64.encode(b"hello world");
        assert!(matches!(
            decode_video(&not_an_image, &test_config()),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_video_size_ceiling() {
        let mut config = test_config();
        config.max_frame_bytes = 16;
        assert!(matches!(
            decode_video(&png_payload(32, 24, 128), &config),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_video_data_url_prefix() {
        let payload = format!("data:image/png;base64,{}", png_payload(8, 8, 10));
        assert!(decode_video(&payload, &test_config()).is_ok());
    }

    #[test]
    fn test_decode_audio_alignment() {
        let odd = BASE64.encode([0u8, 1, 2]);
        assert!(matches!(
            decode_audio(&odd, 100, &test_config()),
            Err(Error::Decode(_))
        ));

        let even = BASE64.encode([0u8, 1, 2, 3]);
        let chunk = decode_audio(&even, 100, &test_config()).unwrap();
        assert_eq!(chunk.samples.len(), 2);
        assert_eq!(chunk.duration_ms(), 100);
    }

    #[test]
    fn test_decode_audio_empty() {
        assert!(matches!(
            decode_audio("", 100, &test_config()),
            Err(Error::Decode(_))
        ));
    }
}
