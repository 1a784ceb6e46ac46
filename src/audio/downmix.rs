//! # Channel Downmixing
//!
//! Collapses decoded per-channel buffers into the single mono channel the
//! speech-recognition service expects.
//!
//! Only the first two channels take part in the mix. Anything beyond
//! channel 1 (centre, LFE, surrounds) is ignored, matching how browser
//! capture devices are actually used: mono or stereo microphones.

/// Mix per-channel sample buffers down to mono.
///
/// ## Behaviour:
/// - **0 channels**: empty buffer
/// - **1 channel**: moved out unchanged, no copy
/// - **2+ channels**: `out[i] = (ch0[i] + ch1[i]) / 2`, output length follows channel 0
///
/// ## Rust Concepts:
/// - **Vec<Vec<f32>> by value**: The caller gives up the decoded channels, so
///   the mono case can hand the first buffer back without cloning it
pub fn downmix(channels: Vec<Vec<f32>>) -> Vec<f32> {
    let mut channels = channels.into_iter();

    let Some(left) = channels.next() else {
        return Vec::new();
    };
    let Some(right) = channels.next() else {
        return left;
    };

    left.iter()
        .enumerate()
        .map(|(i, &l)| {
            // Synchronized decoder output has equal lengths; a short right
            // channel is padded with the left sample.
            let r = right.get(i).copied().unwrap_or(l);
            (l + r) / 2.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_passthrough() {
        let mono = vec![0.1, -0.2, 0.3];
        assert_eq!(downmix(vec![mono.clone()]), mono);
    }

    #[test]
    fn test_identical_stereo_is_identity() {
        let channel = vec![0.5, -0.25, 1.0, -1.0, 0.0];
        assert_eq!(downmix(vec![channel.clone(), channel.clone()]), channel);
    }

    #[test]
    fn test_stereo_average() {
        let left = vec![1.0, 0.0, -1.0];
        let right = vec![0.0, 0.5, 1.0];
        assert_eq!(downmix(vec![left, right]), vec![0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_extra_channels_ignored() {
        let left = vec![0.2, 0.4];
        let right = vec![0.0, 0.0];
        let centre = vec![1.0, 1.0];
        let lfe = vec![-1.0, -1.0];
        let mixed = downmix(vec![left, right, centre, lfe]);

        assert_eq!(mixed.len(), 2);
        assert!((mixed[0] - 0.1).abs() < 1e-6);
        assert!((mixed[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_output_length_follows_first_channel() {
        let mixed = downmix(vec![vec![0.5; 4], vec![0.5; 2]]);
        assert_eq!(mixed, vec![0.5; 4]);
    }

    #[test]
    fn test_no_channels() {
        assert!(downmix(Vec::new()).is_empty());
    }
}
