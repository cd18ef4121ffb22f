use std::sync::Arc;

use crate::receiver::SelcalReceiver;
use crate::table::ReferenceTable;

/// Builds a SELCAL receiver
///
/// The builder comes with a sensible set of default options.
/// All you really need to provide is the input sampling rate
/// and, at build time, the [`ReferenceTable`]. The defaults
/// were chosen for nominal SELCAL timing: tones of about one
/// second, separated by short silences.
///
/// The API specified by the builder is part of this crate's
/// API. The actual default values are *not*, however, and
/// are subject to revision in any minor release. If you
/// care very strongly about a setting, be sure to configure
/// it here.
///
/// ```
/// use selcal::SelcalReceiverBuilder;
///
/// let mut builder = SelcalReceiverBuilder::new(8000);
/// builder
///     .with_window_size(1000)
///     .with_min_sustain(0.2)
///     .with_max_gap(2.5);
/// assert_eq!(1024, builder.window_size());
/// assert_eq!(1600, builder.min_sustain_samples());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SelcalReceiverBuilder {
    input_rate: u32,
    window_size: usize,
    hop: usize,
    band: (f32, f32),
    noise_multiplier: f32,
    relative_floor: f32,
    min_magnitude: f32,
    max_imbalance: f32,
    min_sustain: f32,
    max_dropout: Option<u32>,
    max_gap: f32,
}

impl SelcalReceiverBuilder {
    /// New receiver chain with "sensible" defaults
    ///
    /// The only mandatory parameter is the input sampling
    /// rate, in Hz. The default analysis window is the power
    /// of two nearest above 128 ms of samples, with a hop of
    /// one quarter window.
    pub fn new(input_rate: u32) -> Self {
        let input_rate = u32::max(input_rate, 1);
        let window_size = clamp_window((input_rate as f32 * 0.128) as usize);
        Self {
            input_rate,
            window_size,
            hop: window_size / 4,
            band: (300.0, 3500.0),
            noise_multiplier: 8.0,
            relative_floor: 0.1,
            min_magnitude: 1.0e-3,
            max_imbalance: 4.0,
            min_sustain: 0.25,
            max_dropout: None,
            max_gap: 2.0,
        }
    }

    /// Build a receiver chain
    ///
    /// The receiver matches tones against the given `table`,
    /// which it shares read-only. Once built, the receiver
    /// chain is immediately ready to process samples.
    pub fn build<T>(&self, table: T) -> SelcalReceiver
    where
        T: Into<Arc<ReferenceTable>>,
    {
        SelcalReceiver::new(self, table.into())
    }

    /// Analysis window size (samples)
    ///
    /// The window size is rounded up to a power of two and
    /// limited to `[64, 65536]`. Longer windows give finer
    /// frequency resolution but slower response. If the hop
    /// is now longer than the window, it is shortened.
    pub fn with_window_size(&mut self, size: usize) -> &mut Self {
        self.window_size = clamp_window(size);
        self.hop = usize::min(self.hop, self.window_size);
        self
    }

    /// Hop between analysis windows (samples)
    ///
    /// One spectrum is computed every `hop` samples. The hop
    /// is limited to `[1, window_size]`.
    pub fn with_hop(&mut self, hop: usize) -> &mut Self {
        self.hop = usize::clamp(hop, 1, self.window_size);
        self
    }

    /// Analysis band (Hz)
    ///
    /// Only peaks between `low` and `high` are considered. The
    /// band is limited to the Nyquist frequency.
    pub fn with_band(&mut self, low: f32, high: f32) -> &mut Self {
        let nyquist = self.input_rate as f32 / 2.0;
        let (low, high) = (f32::min(low, high), f32::max(low, high));
        self.band = (f32::clamp(low, 0.0, nyquist), f32::clamp(high, 0.0, nyquist));
        self
    }

    /// Noise floor multiplier
    ///
    /// A spectral peak must exceed this multiple of the median
    /// bin magnitude. Values below 1.0 are raised to 1.0.
    pub fn with_noise_multiplier(&mut self, mult: f32) -> &mut Self {
        self.noise_multiplier = f32::max(mult, 1.0);
        self
    }

    /// Relative peak floor (fraction of strongest peak)
    ///
    /// A spectral peak must reach this fraction of the strongest
    /// peak in its frame to count as significant. Limited to
    /// `[0.0, 1.0]`.
    pub fn with_relative_floor(&mut self, floor: f32) -> &mut Self {
        self.relative_floor = f32::clamp(floor, 0.0, 1.0);
        self
    }

    /// Minimum peak magnitude (linear)
    ///
    /// A sinusoid of amplitude `A` has a peak magnitude of
    /// about `A / 2`. Peaks below this magnitude are ignored.
    pub fn with_min_magnitude(&mut self, mag: f32) -> &mut Self {
        self.min_magnitude = f32::max(mag, 0.0);
        self
    }

    /// Maximum magnitude ratio between the two tones
    ///
    /// A tone pair whose stronger tone exceeds the weaker by
    /// more than this ratio is rejected. Values below 1.0 are
    /// raised to 1.0.
    pub fn with_max_imbalance(&mut self, ratio: f32) -> &mut Self {
        self.max_imbalance = f32::max(ratio, 1.0);
        self
    }

    /// Minimum sustain duration (seconds)
    ///
    /// A tone must be detected continuously for at least this
    /// long to count as a character.
    pub fn with_min_sustain(&mut self, secs: f32) -> &mut Self {
        self.min_sustain = f32::max(secs, 0.0);
        self
    }

    /// Misfire frames bridged within a held tone
    ///
    /// A held tone survives up to `frames` consecutive frames
    /// which are ambiguous or match another character, as long
    /// as the tone resumes. Silence always ends a tone. Set to
    /// zero to end a tone on any other result.
    pub fn with_max_dropout_frames(&mut self, frames: u32) -> &mut Self {
        self.max_dropout = Some(frames);
        self
    }

    /// Maximum inter-tone gap (seconds)
    ///
    /// If no tone starts within this long after the previous
    /// tone ends, the partial code is abandoned.
    pub fn with_max_gap(&mut self, secs: f32) -> &mut Self {
        self.max_gap = f32::max(secs, 0.0);
        self
    }

    /// Input sampling rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Analysis window size (samples)
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Hop between analysis windows (samples)
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Analysis band (Hz)
    pub fn band(&self) -> (f32, f32) {
        self.band
    }

    /// Noise floor multiplier
    pub fn noise_multiplier(&self) -> f32 {
        self.noise_multiplier
    }

    /// Relative peak floor
    pub fn relative_floor(&self) -> f32 {
        self.relative_floor
    }

    /// Minimum peak magnitude
    pub fn min_magnitude(&self) -> f32 {
        self.min_magnitude
    }

    /// Maximum magnitude ratio between the two tones
    pub fn max_imbalance(&self) -> f32 {
        self.max_imbalance
    }

    /// Minimum sustain duration (seconds)
    pub fn min_sustain(&self) -> f32 {
        self.min_sustain
    }

    /// Minimum sustain duration (samples)
    pub fn min_sustain_samples(&self) -> u64 {
        self.seconds_to_samples(self.min_sustain)
    }

    /// Misfire frames bridged within a held tone
    ///
    /// By default, this is one more than the number of hops in
    /// the window: every frame whose window overlaps a short
    /// click or dropout. Limited to one frame less than the
    /// minimum sustain duration.
    pub fn max_dropout_frames(&self) -> u32 {
        self.max_dropout
            .unwrap_or((self.window_size / usize::max(self.hop, 1) + 1) as u32)
    }

    /// Maximum inter-tone gap (seconds)
    pub fn max_gap(&self) -> f32 {
        self.max_gap
    }

    /// Maximum inter-tone gap (samples)
    pub fn max_gap_samples(&self) -> u64 {
        self.seconds_to_samples(self.max_gap)
    }

    fn seconds_to_samples(&self, secs: f32) -> u64 {
        (secs as f64 * self.input_rate as f64).round() as u64
    }
}

impl std::default::Default for SelcalReceiverBuilder {
    fn default() -> Self {
        Self::new(8000)
    }
}

fn clamp_window(size: usize) -> usize {
    usize::clamp(size, 64, 65536).next_power_of_two()
}
