// THEORY:
// The sensor endpoint does not speak JSON. It answers with a raw binary frame:
// the whole matrix as little-endian signed 16-bit integers, each sample scaled by
// ten and truncated. For a 128x128 grid that is 16384 values in 32768 bytes.
//
// This module is the codec for that frame. Decoding is strict about length,
// because a short or long datagram-sized payload means the producer is
// misconfigured, not that the grid changed shape.

pub mod sensor_frame {
    use crate::error::FetchError;

    /// Wire scale: one integer step is a tenth of a sample unit.
    pub const SCALE: f64 = 10.0;
    pub const BYTES_PER_SAMPLE: usize = 2;

    pub fn frame_len(samples: usize) -> usize {
        samples * BYTES_PER_SAMPLE
    }

    /// Decodes a frame of exactly `samples` values into sample units.
    pub fn decode(bytes: &[u8], samples: usize) -> Result<Vec<f64>, FetchError> {
        let expected = frame_len(samples);
        if bytes.len() != expected {
            return Err(FetchError::SensorFrame {
                expected,
                actual: bytes.len(),
            });
        }

        Ok(bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f64 / SCALE)
            .collect())
    }

    /// Encodes sample values, truncating toward zero after scaling.
    /// Values beyond the `i16` range saturate.
    pub fn encode(values: &[f64]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|value| ((value * SCALE) as i16).to_le_bytes())
            .collect()
    }

    /// Rounds a value to what survives one trip through the wire format.
    pub fn quantize(value: f64) -> f64 {
        ((value * SCALE) as i16) as f64 / SCALE
    }
}
