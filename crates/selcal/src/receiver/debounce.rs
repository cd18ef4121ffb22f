//! Burst debouncing
//!
//! SELCAL tones are held for about a second, with sharp
//! transitions between them. The [`BurstDebouncer`] follows runs
//! of consecutive frames which match the same character. When the
//! run ends, it is reported as a [`ToneEvent`] if it lasted at
//! least the minimum sustain duration. Shorter runs are noise and
//! are discarded silently. A few frames of misfire inside a
//! held tone do not end it.

#[cfg(not(test))]
use log::{debug, trace};

#[cfg(test)]
use std::{println as debug, println as trace};

use super::matcher::MatchResult;

/// A sustained tone pair
///
/// All times are input sample counts. The `end` is the timestamp
/// of the last frame that matched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneEvent {
    /// Decoded character
    pub character: char,

    /// Timestamp of the first matching frame
    pub start: u64,

    /// Timestamp of the last matching frame
    pub end: u64,

    /// Best confidence seen during the run
    pub confidence: f32,

    /// Number of frames in the run
    pub frames: u32,
}

impl std::fmt::Display for ToneEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tone '{}' [{}, {}] ({} frames, {:.2} confidence)",
            self.character, self.start, self.end, self.frames, self.confidence
        )
    }
}

/// Turns per-frame matches into tone events
///
/// A held tone may be interrupted by a few frames of misfire,
/// like a click or a burst of interference, which leave the
/// frame `Ambiguous` or briefly matched to some other character.
/// If the run's character resumes within `max_dropout` frames,
/// the run continues as though the misfire never happened. A
/// `NoMatch` frame is silence and always ends the run.
#[derive(Clone, Debug)]
pub struct BurstDebouncer {
    hop: u64,
    min_sustain: u64,
    max_dropout: u32,
    run: Option<ToneEvent>,
    candidate: Option<ToneEvent>,
    misses: u32,
}

impl BurstDebouncer {
    /// New debouncer
    ///
    /// Frames are `hop` samples apart. A run of `k` frames lasts
    /// `k * hop` samples and is reported only if that is at least
    /// `min_sustain` samples. Up to `max_dropout` consecutive
    /// misfire frames are bridged. This is limited to one frame
    /// less than a reportable run, so a bridged misfire can
    /// never be a sustained tone of its own.
    pub fn new(hop: u64, min_sustain: u64, max_dropout: u32) -> Self {
        let hop = u64::max(hop, 1);
        let min_frames = (min_sustain + hop - 1) / hop;
        Self {
            hop,
            min_sustain,
            max_dropout: u64::min(max_dropout as u64, min_frames.saturating_sub(1)) as u32,
            run: None,
            candidate: None,
            misses: 0,
        }
    }

    /// Minimum sustain duration, in samples
    pub fn min_sustain(&self) -> u64 {
        self.min_sustain
    }

    /// Minimum number of frames in a reportable run
    pub fn min_frames(&self) -> u64 {
        (self.min_sustain + self.hop - 1) / self.hop
    }

    /// Most consecutive misfire frames bridged within a run
    pub fn max_dropout(&self) -> u32 {
        self.max_dropout
    }

    /// Process one frame's match result
    ///
    /// `timestamp` is the frame's timestamp and must not
    /// decrease. Returns a tone event when a sufficiently long
    /// run has just ended.
    pub fn input(&mut self, result: &MatchResult, timestamp: u64) -> Option<ToneEvent> {
        let held = match &self.run {
            Some(run) => run.character,
            None => {
                if let MatchResult::Matched(c, conf) = *result {
                    self.begin(begin_run(c, conf, timestamp));
                }
                return None;
            }
        };

        match *result {
            MatchResult::NoMatch => self.interrupt(),
            MatchResult::Matched(c, conf) if c == held => {
                if let Some(misfire) = self.candidate.take() {
                    trace!(
                        "debounce [{:<14}]: bridged misfire '{}' ({} frames)",
                        misfire.start,
                        misfire.character,
                        misfire.frames
                    );
                }
                self.misses = 0;
                if let Some(run) = self.run.as_mut() {
                    extend_run(run, conf, timestamp);
                }
                None
            }
            MatchResult::Matched(c, conf) => {
                match self.candidate.as_mut() {
                    Some(cand) if cand.character == c => extend_run(cand, conf, timestamp),
                    _ => self.candidate = Some(begin_run(c, conf, timestamp)),
                }
                self.misfire()
            }
            MatchResult::Ambiguous => {
                self.candidate = None;
                self.misfire()
            }
        }
    }

    /// End the current run, as if a non-matching frame were seen
    pub fn interrupt(&mut self) -> Option<ToneEvent> {
        self.candidate = None;
        self.release()
    }

    /// Earliest start time of any tone that is still in progress
    ///
    /// If a run is in progress, returns its start. Otherwise
    /// returns `now`. No tone event reported in the future can
    /// start before this time.
    pub fn horizon(&self, now: u64) -> u64 {
        match &self.run {
            Some(run) => run.start,
            None => now,
        }
    }

    /// True if a run is in progress
    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Reset to initial conditions, discarding any run
    pub fn reset(&mut self) {
        self.run = None;
        self.candidate = None;
        self.misses = 0;
    }

    fn begin(&mut self, run: ToneEvent) {
        trace!(
            "debounce [{:<14}]: begin run '{}'",
            run.start,
            run.character
        );
        self.run = Some(run);
    }

    // One more frame which does not match the run. Past the
    // dropout limit, the run ends and any other character that
    // was matching takes over from its first frame.
    fn misfire(&mut self) -> Option<ToneEvent> {
        self.misses = self.misses.saturating_add(1);
        if self.misses <= self.max_dropout {
            return None;
        }

        let out = self.release();
        if let Some(next) = self.candidate.take() {
            self.begin(next);
        }
        out
    }

    fn release(&mut self) -> Option<ToneEvent> {
        self.misses = 0;
        let run = self.run.take()?;
        if run.frames as u64 * self.hop >= self.min_sustain {
            debug!("debounce: {}", run);
            Some(run)
        } else {
            trace!(
                "debounce [{:<14}]: discarded short run '{}' ({} frames)",
                run.start,
                run.character,
                run.frames
            );
            None
        }
    }
}

fn begin_run(character: char, confidence: f32, timestamp: u64) -> ToneEvent {
    ToneEvent {
        character,
        start: timestamp,
        end: timestamp,
        confidence,
        frames: 1,
    }
}

fn extend_run(run: &mut ToneEvent, confidence: f32, timestamp: u64) {
    run.end = timestamp;
    run.frames = run.frames.saturating_add(1);
    run.confidence = f32::max(run.confidence, confidence);
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOP: u64 = 256;

    fn feed(uut: &mut BurstDebouncer, results: &[MatchResult]) -> Vec<ToneEvent> {
        results
            .iter()
            .enumerate()
            .filter_map(|(i, res)| uut.input(res, i as u64 * HOP))
            .collect()
    }

    fn run_of(c: char, frames: usize) -> Vec<MatchResult> {
        let mut out = vec![MatchResult::Matched(c, 0.9); frames];
        out.push(MatchResult::NoMatch);
        out
    }

    #[test]
    fn test_debounce_floor() {
        let mut uut = BurstDebouncer::new(HOP, 4 * HOP, 0);
        assert_eq!(4, uut.min_frames());

        // one frame short
        assert!(feed(&mut uut, &run_of('A', 3)).is_empty());
        assert!(!uut.is_active());

        // exactly at the floor
        let mut uut = BurstDebouncer::new(HOP, 4 * HOP, 0);
        let evts = feed(&mut uut, &run_of('A', 4));
        assert_eq!(1, evts.len());
        assert_eq!('A', evts[0].character);
        assert_eq!(0, evts[0].start);
        assert_eq!(3 * HOP, evts[0].end);
        assert_eq!(4, evts[0].frames);
    }

    #[test]
    fn test_release_on_change() {
        let mut uut = BurstDebouncer::new(HOP, 2 * HOP, 0);
        let mut results = vec![MatchResult::Matched('A', 0.5); 3];
        results.push(MatchResult::Matched('A', 0.8));
        results.extend([MatchResult::Matched('B', 0.9); 3]);
        results.push(MatchResult::Ambiguous);

        let evts = feed(&mut uut, &results);
        assert_eq!(2, evts.len());
        assert_eq!('A', evts[0].character);
        assert_eq!(0.8, evts[0].confidence);
        assert_eq!('B', evts[1].character);
        assert_eq!(4 * HOP, evts[1].start);
        assert_eq!(6 * HOP, evts[1].end);
    }

    #[test]
    fn test_no_event_while_held() {
        let mut uut = BurstDebouncer::new(HOP, 2 * HOP, 1);
        let held = vec![MatchResult::Matched('C', 0.9); 10];
        assert!(feed(&mut uut, &held).is_empty());
        assert!(uut.is_active());
        assert_eq!(0, uut.horizon(100 * HOP));

        let evt = uut.interrupt().expect("run released");
        assert_eq!(10, evt.frames);
        assert!(!uut.is_active());
        assert_eq!(100 * HOP, uut.horizon(100 * HOP));
        assert_eq!(None, uut.interrupt());
    }

    #[test]
    fn test_bridge_misfire() {
        // ambiguous frames inside a tone
        let mut uut = BurstDebouncer::new(HOP, 8 * HOP, 3);
        let mut results = vec![MatchResult::Matched('A', 0.9); 15];
        results.extend([MatchResult::Ambiguous; 2]);
        results.extend(run_of('A', 15));

        let evts = feed(&mut uut, &results);
        assert_eq!(1, evts.len());
        assert_eq!('A', evts[0].character);
        assert_eq!(0, evts[0].start);
        assert_eq!(31 * HOP, evts[0].end);
        assert_eq!(30, evts[0].frames);

        // a brief match to some other character
        let mut uut = BurstDebouncer::new(HOP, 8 * HOP, 3);
        let mut results = vec![MatchResult::Matched('A', 0.9); 15];
        results.extend([MatchResult::Matched('B', 0.9); 3]);
        results.extend(run_of('A', 15));

        let evts = feed(&mut uut, &results);
        assert_eq!(1, evts.len());
        assert_eq!('A', evts[0].character);
        assert_eq!(32 * HOP, evts[0].end);
        assert_eq!(30, evts[0].frames);
        assert!(!uut.is_active());
    }

    #[test]
    fn test_long_misfire_splits() {
        let mut uut = BurstDebouncer::new(HOP, 4 * HOP, 2);
        let mut results = vec![MatchResult::Matched('A', 0.9); 10];
        results.extend([MatchResult::Ambiguous; 3]);
        results.extend(run_of('A', 10));

        let evts = feed(&mut uut, &results);
        assert_eq!(2, evts.len());
        assert_eq!(9 * HOP, evts[0].end);
        assert_eq!(10, evts[0].frames);
        assert_eq!(13 * HOP, evts[1].start);
        assert_eq!(22 * HOP, evts[1].end);
    }

    #[test]
    fn test_silence_ends_run() {
        let mut uut = BurstDebouncer::new(HOP, 4 * HOP, 3);
        let mut results = run_of('A', 10);
        results.extend(run_of('A', 10));

        let evts = feed(&mut uut, &results);
        assert_eq!(2, evts.len());
        assert_eq!(9 * HOP, evts[0].end);
        assert_eq!(11 * HOP, evts[1].start);
    }

    #[test]
    fn test_handover_keeps_start() {
        let mut uut = BurstDebouncer::new(HOP, 4 * HOP, 2);
        let mut results = vec![MatchResult::Matched('A', 0.9); 10];
        results.extend(run_of('B', 6));

        let evts = feed(&mut uut, &results);
        assert_eq!(2, evts.len());
        assert_eq!('A', evts[0].character);
        assert_eq!(9 * HOP, evts[0].end);
        assert_eq!('B', evts[1].character);
        assert_eq!(10 * HOP, evts[1].start);
        assert_eq!(15 * HOP, evts[1].end);
        assert_eq!(6, evts[1].frames);
    }

    #[test]
    fn test_dropout_limited_by_sustain() {
        assert_eq!(3, BurstDebouncer::new(HOP, 4 * HOP, 10).max_dropout());
        assert_eq!(2, BurstDebouncer::new(HOP, 4 * HOP, 2).max_dropout());
        assert_eq!(0, BurstDebouncer::new(HOP, 0, 5).max_dropout());
    }

    #[test]
    fn test_round_trip_every_character() {
        for c in "ABCDEFGHJKLMPQRS".chars() {
            let mut uut = BurstDebouncer::new(HOP, 4 * HOP, 3);
            let mut results = vec![MatchResult::NoMatch; 2];
            results.extend(run_of(c, 30));
            results.extend(vec![MatchResult::NoMatch; 10]);
            let evts = feed(&mut uut, &results);
            assert_eq!(1, evts.len());
            assert_eq!(c, evts[0].character);
        }
    }
}
