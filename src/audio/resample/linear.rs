/// Linear-interpolation resampler over interleaved i16 PCM.
///
/// Carries the fractional read position and the last input frame across calls
/// so consecutive blocks join without clicks.
pub struct LinearResampler {
    /// Input frames consumed per output frame.
    step: f64,
    position: f64,
    previous: Vec<i16>,
    channels: usize,
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: usize) -> Self {
        Self {
            step: source_rate as f64 / target_rate as f64,
            position: 0.0,
            previous: vec![0; channels],
            channels,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        (self.step - 1.0).abs() < f64::EPSILON
    }

    /// Resamples `input`, appending to `output`.
    pub fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        let channels = self.channels;
        let frames = input.len() / channels;
        if frames == 0 {
            return;
        }

        let frame_at = |idx: isize, ch: usize, previous: &[i16]| -> f64 {
            if idx < 0 {
                previous[ch] as f64
            } else {
                input[(idx as usize).min(frames - 1) * channels + ch] as f64
            }
        };

        // `position` is measured from the previous block's last frame (index -1).
        while self.position < frames as f64 {
            let base = self.position.floor();
            let frac = self.position - base;
            let left = base as isize - 1;
            for ch in 0..channels {
                let a = frame_at(left, ch, &self.previous);
                let b = frame_at(left + 1, ch, &self.previous);
                output.push((a + (b - a) * frac).round() as i16);
            }
            self.position += self.step;
        }
        self.position -= frames as f64;

        let last = (frames - 1) * channels;
        self.previous.copy_from_slice(&input[last..last + channels]);
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.previous.fill(0);
    }
}

/// Converts interleaved PCM with `channels` channels into stereo.
/// Mono is duplicated, extra channels past the first two are dropped.
pub fn to_stereo(input: &[i16], channels: usize) -> Vec<i16> {
    match channels {
        2 => input.to_vec(),
        0 => Vec::new(),
        1 => input.iter().flat_map(|&s| [s, s]).collect(),
        n => input
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
