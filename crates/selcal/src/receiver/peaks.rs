//! Spectral peak extraction
//!
//! The [`PeakExtractor`] finds the two dominant tones in a
//! [`SpectrumFrame`]. A bin is a peak candidate if it is a local
//! maximum and its magnitude clears all of:
//!
//! 1. the noise floor (median bin magnitude) times a multiplier;
//! 2. a fraction of the strongest candidate in the frame, so the
//!    window side lobes of a strong tone never count; and
//! 3. an absolute minimum magnitude, so silence has no peaks.
//!
//! The frequency of each of the two strongest candidates is then
//! refined by fitting a parabola to the log magnitudes of the peak
//! bin and its two neighbors.

use arrayvec::ArrayVec;

use super::spectrum::SpectrumFrame;

/// A spectral peak
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// Interpolated frequency (Hz)
    pub frequency: f32,

    /// Interpolated magnitude
    pub magnitude: f32,
}

/// Up to two strongest peaks of one frame
///
/// Peaks are stored in descending order of magnitude. The pair
/// also records how many peaks qualified in total, which may be
/// more than two.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakPair {
    peaks: ArrayVec<Peak, 2>,
    qualifying: usize,
    timestamp: u64,
}

impl PeakPair {
    /// Create from peaks, strongest first
    pub fn new<I>(peaks: I, qualifying: usize, timestamp: u64) -> Self
    where
        I: IntoIterator<Item = Peak>,
    {
        let peaks: ArrayVec<Peak, 2> = peaks.into_iter().take(2).collect();
        Self {
            qualifying: usize::max(qualifying, peaks.len()),
            peaks,
            timestamp,
        }
    }

    /// The strongest peaks, strongest first
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Total number of peaks which qualified
    pub fn qualifying(&self) -> usize {
        self.qualifying
    }

    /// Input sample count at the start of the frame
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Finds the dominant peaks of a spectrum
#[derive(Clone, Debug)]
pub struct PeakExtractor {
    noise_multiplier: f32,
    relative_floor: f32,
    min_magnitude: f32,
    sorted: Vec<f32>,
    candidates: Vec<(usize, f32)>,
}

impl PeakExtractor {
    /// New peak extractor
    ///
    /// A peak must exceed `noise_multiplier` times the median
    /// magnitude, `relative_floor` times the strongest peak in the
    /// frame, and `min_magnitude` in absolute terms.
    pub fn new(noise_multiplier: f32, relative_floor: f32, min_magnitude: f32) -> Self {
        Self {
            noise_multiplier,
            relative_floor,
            min_magnitude,
            sorted: Vec::new(),
            candidates: Vec::new(),
        }
    }

    /// Extract the two strongest peaks from `frame`
    ///
    /// Identical input always yields identical output.
    pub fn extract(&mut self, frame: &SpectrumFrame) -> PeakPair {
        let mags = frame.magnitudes();
        if mags.len() < 3 {
            return PeakPair::new([], 0, frame.timestamp());
        }

        let threshold = f32::max(
            self.noise_multiplier * self.noise_floor(mags),
            self.min_magnitude,
        );

        self.candidates.clear();
        for k in 1..mags.len() - 1 {
            let mag = mags[k];
            if mag > threshold && mag > mags[k - 1] && mag >= mags[k + 1] {
                self.candidates.push((k, mag));
            }
        }

        let strongest = self
            .candidates
            .iter()
            .fold(0.0f32, |acc, &(_, mag)| f32::max(acc, mag));
        let relative = self.relative_floor * strongest;
        self.candidates.retain(|&(_, mag)| mag >= relative);

        // strongest first; equal magnitudes in frequency order
        self.candidates
            .sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        PeakPair::new(
            self.candidates
                .iter()
                .take(2)
                .map(|&(k, _)| interpolate(frame, k)),
            self.candidates.len(),
            frame.timestamp(),
        )
    }

    // Median magnitude across the frame
    fn noise_floor(&mut self, mags: &[f32]) -> f32 {
        self.sorted.clear();
        self.sorted.extend_from_slice(mags);
        let mid = self.sorted.len() / 2;
        let (_, median, _) = self.sorted.select_nth_unstable_by(mid, f32::total_cmp);
        *median
    }
}

// Parabolic interpolation of the peak at bin `k`
//
// Fits a parabola through the log magnitudes of bins `k - 1`,
// `k`, and `k + 1`. The vertex is the refined peak. `k` must
// have a neighbor on either side.
fn interpolate(frame: &SpectrumFrame, k: usize) -> Peak {
    const FLOOR: f32 = 1.0e-12;

    let mags = frame.magnitudes();
    let a = f32::max(mags[k - 1], FLOOR).ln();
    let b = f32::max(mags[k], FLOOR).ln();
    let c = f32::max(mags[k + 1], FLOOR).ln();

    let denom = a - 2.0 * b + c;
    let delta = if denom.abs() > f32::EPSILON {
        f32::clamp(0.5 * (a - c) / denom, -0.5, 0.5)
    } else {
        0.0
    };

    Peak {
        frequency: frame.frequency(k as f32 + delta),
        magnitude: (b - 0.25 * (a - c) * delta).exp(),
    }
}
