//! Spectral analysis
//!
//! The [`SpectralAnalyzer`] converts one window of audio samples
//! into a [`SpectrumFrame`]: the magnitude of each frequency bin
//! within the SELCAL analysis band. A Hann window is applied
//! before the transform to control spectral leakage.
//!
//! Magnitudes are normalized by the coherent gain of the window.
//! A sinusoid of amplitude `A` which falls on the center of a bin
//! produces a magnitude of `A / 2` in that bin.

use std::fmt;
use std::sync::Arc;

#[cfg(not(test))]
use log::warn;

#[cfg(test)]
use std::println as warn;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// Magnitude spectrum of one analysis window
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumFrame {
    timestamp: u64,
    bin_hz: f32,
    first_bin: usize,
    magnitudes: Vec<f32>,
}

impl SpectrumFrame {
    /// Create from magnitudes
    ///
    /// `magnitudes[0]` is the magnitude of FFT bin `first_bin`,
    /// and each bin is `bin_hz` wide. The `timestamp` is the
    /// input sample count at the start of the analysis window.
    pub fn new(timestamp: u64, bin_hz: f32, first_bin: usize, magnitudes: Vec<f32>) -> Self {
        Self {
            timestamp,
            bin_hz,
            first_bin,
            magnitudes,
        }
    }

    /// Input sample count at the start of the window
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Frequency resolution (Hz per bin)
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    /// Magnitudes, in ascending order of frequency
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    /// True if the frame has no bins
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Center frequency of bin `index`, which may be fractional
    pub fn frequency(&self, index: f32) -> f32 {
        (self.first_bin as f32 + index) * self.bin_hz
    }

    /// Iterate over `(frequency, magnitude)` bins
    pub fn bins(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.magnitudes
            .iter()
            .enumerate()
            .map(move |(i, &mag)| (self.frequency(i as f32), mag))
    }
}

/// Windowed real FFT over a fixed-size window
///
/// The FFT plan, window coefficients, and scratch buffers are
/// allocated once at construction. [`analyze()`](Self::analyze)
/// performs no allocation other than the output frame.
#[derive(Clone)]
pub struct SpectralAnalyzer {
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bin_hz: f32,
    first_bin: usize,
    last_bin: usize,
    scale: f32,
}

impl SpectralAnalyzer {
    /// New analyzer
    ///
    /// Analyzes windows of `size` samples, taken at the given
    /// `input_rate` (Hz), and reports bins between `band.0` and
    /// `band.1` (Hz). One extra bin is kept on either side of the
    /// band so that peaks at its edges can be interpolated.
    ///
    /// The `size` must be a power of two, at least 4.
    pub fn new(size: usize, input_rate: u32, band: (f32, f32)) -> Self {
        debug_assert!(size.is_power_of_two() && size >= 4);

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let input = plan.make_input_vec();
        let output = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        let window: Vec<f32> = (0..size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
            })
            .collect();
        let scale = 1.0 / window.iter().sum::<f32>();

        let bin_hz = input_rate as f32 / size as f32;
        let nyquist_bin = size / 2;
        let (low_hz, high_hz) = (f32::min(band.0, band.1), f32::max(band.0, band.1));
        let first_bin = ((low_hz / bin_hz).floor() as usize).saturating_sub(1);
        let last_bin = usize::min((high_hz / bin_hz).ceil() as usize + 1, nyquist_bin);

        Self {
            plan,
            window,
            input,
            output,
            scratch,
            bin_hz,
            first_bin: usize::min(first_bin, last_bin),
            last_bin,
            scale,
        }
    }

    /// Window size, in samples
    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Frequency resolution (Hz per bin)
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    /// Compute the spectrum of one window
    ///
    /// `samples` should be exactly [`size()`](Self::size) long.
    /// Shorter inputs are zero-padded, and excess samples are
    /// ignored. The `timestamp` is the input sample count at the
    /// start of the window.
    pub fn analyze(&mut self, samples: &[f32], timestamp: u64) -> SpectrumFrame {
        let n = usize::min(samples.len(), self.window.len());
        for (i, slot) in self.input.iter_mut().enumerate() {
            *slot = if i < n {
                samples[i] * self.window[i]
            } else {
                0.0
            };
        }

        let bins = self.first_bin..=self.last_bin;
        let magnitudes = match self.plan.process_with_scratch(
            &mut self.input,
            &mut self.output,
            &mut self.scratch,
        ) {
            Ok(()) => self.output[bins]
                .iter()
                .map(|c| c.norm() * self.scale)
                .collect(),
            Err(err) => {
                warn!("spectrum [{:<14}]: transform failed: {}", timestamp, err);
                vec![0.0f32; self.last_bin + 1 - self.first_bin]
            }
        };

        SpectrumFrame::new(timestamp, self.bin_hz, self.first_bin, magnitudes)
    }
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size())
            .field("bin_hz", &self.bin_hz)
            .field("first_bin", &self.first_bin)
            .field("last_bin", &self.last_bin)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    /// Sum of sinusoids `(frequency, amplitude)` at `rate`
    pub(crate) fn tones(rate: u32, len: usize, freqs: &[(f32, f32)]) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                freqs
                    .iter()
                    .map(|&(f, a)| a * (2.0 * std::f32::consts::PI * f * t).sin())
                    .sum()
            })
            .collect()
    }

    fn strongest(frame: &SpectrumFrame) -> (f32, f32) {
        frame
            .bins()
            .fold((0.0f32, 0.0f32), |best, bin| if bin.1 > best.1 { bin } else { best })
    }

    #[test]
    fn test_bin_center_tone() {
        // 1000 Hz is exactly bin 128 at 8 kHz, 1024 points
        let mut analyzer = SpectralAnalyzer::new(1024, 8000, (300.0, 3500.0));
        assert_eq!(1024, analyzer.size());
        assert_approx_eq!(analyzer.bin_hz(), 7.8125);

        let sig = tones(8000, 1024, &[(1000.0, 0.5)]);
        let frame = analyzer.analyze(&sig, 42);
        assert_eq!(42, frame.timestamp());
        assert!(!frame.is_empty());

        let (freq, mag) = strongest(&frame);
        assert_approx_eq!(freq, 1000.0);
        assert_approx_eq!(mag, 0.25, 1.0e-3);
    }

    #[test]
    fn test_band_limits() {
        let mut analyzer = SpectralAnalyzer::new(1024, 8000, (300.0, 3500.0));
        let frame = analyzer.analyze(&[0.0f32; 1024], 0);

        let first = frame.bins().next().expect("bins").0;
        let last = frame.bins().last().expect("bins").0;
        assert!(first < 300.0 && first > 280.0);
        assert!(last > 3500.0 && last < 3520.0);
        assert!(frame.magnitudes().iter().all(|&m| m == 0.0));

        // band beyond Nyquist is clipped
        let mut analyzer = SpectralAnalyzer::new(256, 8000, (300.0, 9000.0));
        let frame = analyzer.analyze(&[0.0f32; 256], 0);
        assert_approx_eq!(frame.frequency((frame.len() - 1) as f32), 4000.0);
    }

    #[test]
    fn test_short_input_zero_padded() {
        let mut analyzer = SpectralAnalyzer::new(256, 8000, (300.0, 3500.0));
        let frame = analyzer.analyze(&[1.0f32; 16], 0);
        assert!(frame.magnitudes().iter().any(|&m| m > 0.0));
    }
}
