//! # Sample Rate Conversion
//!
//! Linear-interpolation resampler used to bring decoded audio (usually
//! 44.1kHz or 48kHz from the browser) down to the recogniser's 16kHz.
//!
//! ## Trade-offs:
//! - **Not band-limited**: Downsampling can alias. For speech at 16kHz this is
//!   acceptable and keeps conversion latency negligible
//! - **Length contract**: Output length is always `round(len * dst / src)`;
//!   downstream duration checks rely on it
//!
//! ## Algorithm:
//! For each output index `i`, the source position is `i * (src / dst)`. The
//! output sample is the weighted average of the two neighbouring input
//! samples; at the trailing edge the last input sample is held.

/// Number of output samples produced for `input_len` samples at `src_rate`
/// converted to `dst_rate`.
pub fn output_len(input_len: usize, src_rate: u32, dst_rate: u32) -> usize {
    if src_rate == dst_rate {
        return input_len;
    }
    let ratio = src_rate as f64 / dst_rate as f64;
    (input_len as f64 / ratio).round() as usize
}

/// Resample a mono buffer from `src_rate` to `dst_rate`.
///
/// ## Parameters:
/// - **input**: Mono samples, consumed
/// - **src_rate**: Native rate of `input` in Hz
/// - **dst_rate**: Desired output rate in Hz
///
/// ## Returns:
/// The input itself when the rates match (no interpolation error is
/// introduced), otherwise a new buffer of [`output_len`] samples.
///
/// Both rates must be non-zero. The pipeline rejects a zero target rate
/// before decoding and turns a zero native rate into a decode error.
pub fn resample(input: Vec<f32>, src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate {
        return input;
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let len = output_len(input.len(), src_rate, dst_rate);

    (0..len)
        .map(|i| {
            let position = i as f64 * ratio;
            let idx = position.floor() as usize;
            let frac = (position - idx as f64) as f32;

            match (input.get(idx), input.get(idx + 1)) {
                (Some(&current), Some(&next)) => current * (1.0 - frac) + next * frac,
                (Some(&current), None) => current,
                _ => 0.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 / len as f32).collect()
    }

    #[test]
    fn test_identity_when_rates_match() {
        let input = vec![0.3, -0.7, 1.5, -2.0];
        for rate in [8000, 16000, 44100, 48000] {
            assert_eq!(resample(input.clone(), rate, rate), input);
        }
    }

    #[test]
    fn test_length_law() {
        let cases = [
            (4800, 48000, 16000),
            (1000, 44100, 16000),
            (441, 44100, 16000),
            (160, 16000, 48000),
            (777, 22050, 16000),
            (3, 8000, 16000),
        ];
        for (len, src, dst) in cases {
            let expected = (len as f64 * dst as f64 / src as f64).round() as usize;
            let output = resample(ramp(len), src, dst);
            assert_eq!(output.len(), expected, "len={} {}Hz -> {}Hz", len, src, dst);
        }
    }

    #[test]
    fn test_decimation_picks_exact_samples() {
        // 48k -> 16k has an integer ratio of 3, so every output lands on an input sample
        let input: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let output = resample(input, 48000, 16000);
        assert_eq!(output, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_upsampling_interpolates() {
        let output = resample(vec![0.0, 1.0], 8000, 16000);
        assert_eq!(output.len(), 4);
        assert_eq!(output[0], 0.0);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert_eq!(output[2], 1.0);
        // Trailing edge holds the last sample
        assert_eq!(output[3], 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(Vec::new(), 48000, 16000).is_empty());
    }
}
