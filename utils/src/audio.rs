use base64::Engine;
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree};

pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Unpacks one base64 fragment of little-endian PCM16 into unit-amplitude
/// samples. Fails on malformed base64 or a stray half sample.
pub fn decode(fragment: &str) -> anyhow::Result<Vec<f32>> {
    let pcm16 = base64::engine::general_purpose::STANDARD
        .decode(fragment)
        .map_err(|e| anyhow::anyhow!("invalid base64 audio fragment: {}", e))?;
    if pcm16.len() % 2 != 0 {
        return Err(anyhow::anyhow!(
            "pcm16 fragment has odd byte length: {}",
            pcm16.len()
        ));
    }
    Ok(pcm16
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
        })
        .collect())
}

/// Packs unit-amplitude samples as little-endian PCM16 inside a base64 text
/// envelope. Lossless apart from the 16-bit quantization.
pub fn encode(pcm32: &[f32]) -> String {
    let pcm16: Vec<u8> = pcm32
        .iter()
        .flat_map(|&sample| {
            ((sample * i16::MAX as f32) as i16)
                .clamp(i16::MIN, i16::MAX)
                .to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_within_quantization_error() {
        let samples = vec![0.0, 0.25, -0.25, 0.9999, -0.9999, 0.5];
        let decoded = decode(&encode(&samples)).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1.0 / i16::MAX as f32 * 2.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn encode_clamps_out_of_range_amplitudes() {
        let decoded = decode(&encode(&[2.0, -2.0])).unwrap();
        assert!(decoded[0] > 0.99);
        assert!(decoded[1] < -0.99);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("not base64!!").is_err());
    }

    #[test]
    fn decode_rejects_odd_byte_count() {
        let odd = base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2]);
        assert!(decode(&odd).is_err());
    }

    #[test]
    fn split_pads_the_trailing_chunk() {
        let chunks = split_for_chunks(&[1.0; 5], 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], vec![1.0, 0.0, 0.0, 0.0]);
    }
}
