//! Full receiver chain

#[cfg(not(test))]
use log::{info, trace, warn};

#[cfg(test)]
use std::println as trace;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as warn;

use std::iter::{IntoIterator, Iterator};
use std::sync::Arc;

use arraydeque::ArrayDeque;

mod debounce;
mod decoder;
mod matcher;
mod output;
mod peaks;
mod spectrum;
mod timeddata;
mod window;

pub use debounce::{BurstDebouncer, ToneEvent};
pub use decoder::{
    AbandonReason, AbandonedSequence, CodeState, DecodedCode, DecoderPhase, DecoderState,
    SelcalDecoder, CODE_LENGTH,
};
pub use matcher::{MatchResult, ToneMatcher};
pub use output::{SelcalEventType, SelcalReceiverEvent};
pub use peaks::{Peak, PeakExtractor, PeakPair};
pub use spectrum::{SpectralAnalyzer, SpectrumFrame};

use crate::builder::SelcalReceiverBuilder;
use crate::table::ReferenceTable;
use window::Window;

/// A complete SELCAL receiver chain
///
/// The receive chain takes `f32` audio samples and performs
/// the following operations once per hop:
///
/// 1. Spectral analysis of the most recent window of samples
/// 2. Extraction of the two strongest spectral peaks
/// 3. Matching of the peaks against the reference table
/// 4. Debouncing of the per-frame matches into sustained tones
/// 5. Assembly of four tones into a SELCAL code
///
/// To create the receiver, first create its Builder:
///
/// ```
/// use selcal::{ReferenceTable, SelcalReceiverBuilder, Tolerance};
///
/// let table = ReferenceTable::new(
///     [312.6, 346.7, 384.6],
///     [('A', 312.6, 346.7), ('B', 346.7, 384.6)],
///     Tolerance::default(),
/// )
/// .expect("valid table");
///
/// let receiver = SelcalReceiverBuilder::new(8000).build(table);
/// assert_eq!(receiver.input_rate(), 8000);
/// ```
///
/// See [module documentation](index.html) for details.
#[derive(Clone, Debug)]
pub struct SelcalReceiver {
    window: Window<f32>,
    analyzer: SpectralAnalyzer,
    extractor: PeakExtractor,
    matcher: ToneMatcher,
    debouncer: BurstDebouncer,
    decoder: SelcalDecoder,
    input_rate: u32,
    hop: u32,
    input_sample_counter: u64,
    samples_until_next_frame: u32,
    last_code_state: CodeState,
    pending: ArrayDeque<SelcalReceiverEvent, 8>,
}

impl SelcalReceiver {
    /// Receive SELCAL codes from a source of audio
    ///
    /// Bind an iterator which will consume the `input` and
    /// produce [`SelcalReceiverEvent`] events, which include:
    ///
    /// * sustained tones, as each one ends;
    /// * characters added to the code in progress;
    /// * partial codes which were abandoned; and
    /// * complete codes.
    ///
    /// The `input` must be f32 PCM mono audio at the
    /// [`input_rate()`](#method.input_rate) for this receiver,
    /// scaled to about `[-1.0, 1.0]`. Sound cards commonly
    /// output audio samples in `i16` format. You must perform
    /// the conversion to floating-point yourself, if needed.
    ///
    /// The iterator will consume as many samples of `input`
    /// that are required to produce the next event. It will
    /// return `None` if the input is exhausted and there
    /// are no new events.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter<'rx, I, T>(&'rx mut self, input: I) -> SourceIter<'rx, T>
    where
        I: IntoIterator<Item = f32> + IntoIterator<IntoIter = T>,
        T: Iterator<Item = f32>,
    {
        SourceIter {
            source: input.into_iter(),
            receiver: self,
        }
    }

    /// Input sampling rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Lifetime total input sample counter
    ///
    /// Reports the lifetime total of input samples which
    /// have been processed, including any samples skipped
    /// by [`resync()`](#method.resync).
    pub fn input_sample_counter(&self) -> u64 {
        self.input_sample_counter
    }

    /// Reference table
    pub fn table(&self) -> &ReferenceTable {
        self.matcher.table()
    }

    /// Code assembly state
    pub fn decoder_state(&self) -> &DecoderState {
        self.decoder.state()
    }

    /// Clear all DSP states and reset to zero initial conditions
    ///
    /// All buffers and states are cleared. Any code in progress
    /// is discarded without being reported.
    pub fn reset(&mut self) {
        self.window.reset();
        self.debouncer.reset();
        self.decoder.reset();
        self.input_sample_counter = 0;
        self.samples_until_next_frame = self.hop;
        self.last_code_state = CodeState::Idle;
        self.pending.clear();
    }

    /// Flush the DSP buffers and emit any leftover codes
    ///
    /// The analysis window imposes delay on the input. A tone
    /// at the very end of the input is not reported until
    /// enough later samples arrive to show that it has ended.
    ///
    /// This method flushes the input with an adequate number
    /// of zeros to release any tone still in progress. Returns
    /// the last `DecodedCode` generated, if any. A partial
    /// code in progress is *not* timed out.
    ///
    /// You probably want to [`reset()`](#method.reset) after
    /// calling this method.
    pub fn flush(&mut self) -> Option<DecodedCode> {
        let zeros = std::iter::repeat(0.0f32).take(self.window.len() + 2 * self.hop as usize);
        let mut out = None;
        for evt in self.iter(zeros) {
            if let Some(code) = evt.into_code() {
                out = Some(code);
            }
        }
        out
    }

    /// Skip forward to the given sample index
    ///
    /// Call this when input samples were lost, such as when a
    /// block of audio was dropped. The next sample is treated
    /// as input sample number `sample_index`. Any tone in
    /// progress is ended, and the analysis window is cleared,
    /// so that no spectrum spans the discontinuity. Timestamps
    /// remain accurate.
    ///
    /// Indices which would move the counter backwards are
    /// ignored.
    pub fn resync(&mut self, sample_index: u64) {
        if sample_index == self.input_sample_counter {
            return;
        }
        if sample_index < self.input_sample_counter {
            warn!(
                "receiver [{:<14}]: ignoring resync to earlier sample {}",
                self.input_sample_counter, sample_index
            );
            return;
        }

        warn!(
            "receiver [{:<14}]: skipped {} samples",
            self.input_sample_counter,
            sample_index - self.input_sample_counter
        );
        if let Some(tone) = self.debouncer.interrupt() {
            self.accept_tone(tone);
        }
        self.window.reset();
        self.input_sample_counter = sample_index;
        self.samples_until_next_frame = self.hop;
    }

    // Process a single sample
    //
    // Pushes the sample onto the analysis window. Once every
    // hop, analyzes the window. Events are queued to `pending`.
    #[inline]
    fn process(&mut self, input: f32) {
        self.window.push([input]);
        self.input_sample_counter = self.input_sample_counter.wrapping_add(1);
        self.samples_until_next_frame = self.samples_until_next_frame.saturating_sub(1);
        if self.samples_until_next_frame == 0 {
            self.samples_until_next_frame = self.hop;
            self.process_frame();
        }
    }

    // Analyze the current window
    fn process_frame(&mut self) {
        let timestamp = self
            .input_sample_counter
            .saturating_sub(self.window.len() as u64);

        let frame = self.analyzer.analyze(self.window.as_slice(), timestamp);
        let peaks = self.extractor.extract(&frame);
        let matched = self.matcher.input(&peaks);
        if matched != MatchResult::NoMatch {
            trace!("receiver [{:<14}]: {}", timestamp, matched);
        }

        if let Some(tone) = self.debouncer.input(&matched, timestamp) {
            self.accept_tone(tone);
        }

        // a tone still being held can't time out the code
        let horizon = self.debouncer.horizon(timestamp);
        let state = self.decoder.idle(horizon);
        self.update_code(state);
    }

    // Report a tone and pass it to the decoder
    fn accept_tone(&mut self, tone: ToneEvent) {
        self.emit(tone);
        let state = self.decoder.input(&tone);
        self.update_code(state);
    }

    // Report code layer changes
    fn update_code(&mut self, state: CodeState) {
        if state == self.last_code_state {
            return;
        }
        self.last_code_state = state.clone();
        if state != CodeState::Idle {
            self.emit(state);
        }
    }

    fn emit<E>(&mut self, what: E)
    where
        E: Into<SelcalEventType>,
    {
        let evt = SelcalReceiverEvent::new(what, self.input_sample_counter);
        if let Err(err) = self.pending.push_back(evt) {
            warn!("receiver: event queue full, dropped {}", err.element);
        }
    }

    pub(crate) fn new(cfg: &SelcalReceiverBuilder, table: Arc<ReferenceTable>) -> Self {
        let input_rate = cfg.input_rate();
        let hop = cfg.hop() as u32;

        Self {
            window: Window::new(cfg.window_size()),
            analyzer: SpectralAnalyzer::new(cfg.window_size(), input_rate, cfg.band()),
            extractor: PeakExtractor::new(
                cfg.noise_multiplier(),
                cfg.relative_floor(),
                cfg.min_magnitude(),
            ),
            matcher: ToneMatcher::new(table, cfg.max_imbalance()),
            debouncer: BurstDebouncer::new(
                hop as u64,
                cfg.min_sustain_samples(),
                cfg.max_dropout_frames(),
            ),
            decoder: SelcalDecoder::new(cfg.max_gap_samples(), hop as u64),
            input_rate,
            hop,
            input_sample_counter: 0,
            samples_until_next_frame: hop,
            last_code_state: CodeState::Idle,
            pending: ArrayDeque::new(),
        }
    }
}

/// Sample source iterator
///
/// This iterator is bound to a source of mono f32 PCM
/// audio samples. Calling the `next()` method will
/// return the next [`SelcalReceiverEvent`] from the
/// receiver or `None` if the available samples have
/// been consumed without any new events.
#[derive(Debug)]
pub struct SourceIter<'rx, I>
where
    I: Iterator<Item = f32>,
{
    source: I,
    receiver: &'rx mut SelcalReceiver,
}

impl<'rx, I> Iterator for SourceIter<'rx, I>
where
    I: Iterator<Item = f32>,
{
    type Item = SelcalReceiverEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(out) = self.receiver.pending.pop_front() {
                info!("receiver {}", out);
                return Some(out);
            }
            let sa = self.source.next()?;
            self.receiver.process(sa);
        }
    }
}
