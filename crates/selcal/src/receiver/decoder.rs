//! Assembles tone events into SELCAL codes
//!
//! A SELCAL code is four characters, sent as two pair bursts.
//! Each character is a [`ToneEvent`] from the
//! [debouncer](super::debounce). The [`SelcalDecoder`] follows
//! these rules:
//!
//! 1. The first tone starts a sequence. Each further tone is
//!    accepted if it starts no more than the maximum inter-tone
//!    gap after the previous tone ended. A gap of exactly the
//!    maximum is accepted.
//!
//! 2. The fourth tone completes the code. The decoder reports a
//!    [`DecodedCode`] and is immediately ready for a new sequence.
//!
//! 3. If the gap elapses with fewer than four tones, the partial
//!    sequence is reported as an [`AbandonedSequence`] and
//!    discarded. The decoder learns about the passage of time via
//!    [`idle()`](SelcalDecoder::idle).
//!
//! 4. A tone for the same character as the previous tone in the
//!    sequence, which starts with no observable gap, is the same
//!    physical tone split in two. It does not add a character.
//!    The [debouncer](super::debounce) already bridges misfires
//!    within a held tone, so its tones are never split this way;
//!    the rule guards against other sources of tone events.

use arrayvec::ArrayVec;
use strum::EnumMessage;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use super::debounce::ToneEvent;
use super::timeddata::TimedData;

/// Number of characters in a SELCAL code
pub const CODE_LENGTH: usize = 4;

/// A complete SELCAL code
///
/// Times are input sample counts: the start of the first tone
/// and the end of the last tone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecodedCode {
    code: String,
    start: u64,
    end: u64,
}

impl DecodedCode {
    /// Create from code and times
    pub fn new<S>(code: S, start: u64, end: u64) -> Self
    where
        S: Into<String>,
    {
        Self {
            code: code.into(),
            start,
            end,
        }
    }

    /// The code, like "`AMBC`"
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Start of the first tone
    pub fn start(&self) -> u64 {
        self.start
    }

    /// End of the last tone
    pub fn end(&self) -> u64 {
        self.end
    }

    /// True if no character appears twice
    ///
    /// Assigned SELCAL codes never repeat a character within the
    /// code. A code which does is almost certainly a misdecode.
    pub fn has_unique_characters(&self) -> bool {
        self.code
            .chars()
            .enumerate()
            .all(|(i, c)| !self.code.chars().skip(i + 1).any(|other| other == c))
    }
}

impl AsRef<str> for DecodedCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for DecodedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

/// Why a partial sequence was abandoned
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage, strum_macros::EnumString,
)]
pub enum AbandonReason {
    /// No tone within the maximum inter-tone gap
    #[strum(
        serialize = "timeout",
        detailed_message = "no tone within the maximum inter-tone gap"
    )]
    Timeout,
}

impl AbandonReason {
    /// Short machine-readable string, like "`timeout`"
    pub fn as_str(&self) -> &'static str {
        self.get_serializations()[0]
    }

    /// Human-readable description
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().unwrap_or_else(|| self.as_str())
    }
}

impl AsRef<str> for AbandonReason {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incomplete sequence which was discarded
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbandonedSequence {
    partial: String,
    first_start: u64,
    last_end: u64,
    abandoned_at: u64,
    reason: AbandonReason,
}

impl AbandonedSequence {
    /// Characters received before the sequence was abandoned
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Start of the first tone
    pub fn first_start(&self) -> u64 {
        self.first_start
    }

    /// End of the last tone
    pub fn last_end(&self) -> u64 {
        self.last_end
    }

    /// Input sample count at which the sequence was abandoned
    pub fn abandoned_at(&self) -> u64 {
        self.abandoned_at
    }

    /// Reason for abandonment
    pub fn reason(&self) -> AbandonReason {
        self.reason
    }
}

impl std::fmt::Display for AbandonedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" at {} ({})",
            self.partial,
            self.abandoned_at,
            self.reason.as_display_str()
        )
    }
}

/// Decoder lifecycle phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::AsRefStr)]
pub enum DecoderPhase {
    /// No characters buffered
    #[strum(serialize = "idle")]
    Idle,

    /// One to three characters buffered
    #[strum(serialize = "accumulating")]
    Accumulating,

    /// Four characters buffered
    ///
    /// This phase is terminal. The decoder reports the code and
    /// returns to `Idle` before it accepts anything else.
    #[strum(serialize = "complete")]
    Complete,
}

/// Code layer status
///
/// Reported by the decoder after each tone event and each
/// [`idle()`](SelcalDecoder::idle) poll.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodeState {
    /// No sequence in progress
    Idle,

    /// Sequence in progress, with the characters received so far
    Accumulating(String),

    /// A complete code
    Decoded(DecodedCode),

    /// An incomplete sequence was discarded
    Abandoned(AbandonedSequence),
}

impl AsRef<str> for CodeState {
    fn as_ref(&self) -> &str {
        match self {
            CodeState::Idle => "idle",
            CodeState::Accumulating(_) => "accumulating",
            CodeState::Decoded(_) => "decoded",
            CodeState::Abandoned(_) => "abandoned",
        }
    }
}

impl std::fmt::Display for CodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeState::Idle => write!(f, "{}", self.as_ref()),
            CodeState::Accumulating(partial) => write!(f, "{}: \"{}\"", self.as_ref(), partial),
            CodeState::Decoded(code) => write!(
                f,
                "{}: \"{}\" [{}, {}]",
                self.as_ref(),
                code,
                code.start(),
                code.end()
            ),
            CodeState::Abandoned(seq) => write!(f, "{}: {}", self.as_ref(), seq),
        }
    }
}

/// Decoder state
///
/// Owned and mutated only by its [`SelcalDecoder`].
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderState {
    buffer: ArrayVec<char, CODE_LENGTH>,
    first_start: u64,
    last: Option<TimedData<ToneEvent>>,
    phase: DecoderPhase,
}

impl DecoderState {
    /// Characters buffered so far
    pub fn buffer(&self) -> &[char] {
        &self.buffer
    }

    /// End of the last accepted tone, if any
    pub fn last_end(&self) -> Option<u64> {
        self.last.as_ref().map(|last| last.data.end)
    }

    /// Lifecycle phase
    pub fn phase(&self) -> DecoderPhase {
        self.phase
    }

    fn partial(&self) -> String {
        self.buffer.iter().collect()
    }
}

impl Default for DecoderState {
    fn default() -> Self {
        Self {
            buffer: ArrayVec::new(),
            first_start: 0,
            last: None,
            phase: DecoderPhase::Idle,
        }
    }
}

/// SELCAL code state machine
#[derive(Clone, Debug)]
pub struct SelcalDecoder {
    max_gap: u64,
    merge_window: u64,
    state: DecoderState,
}

impl SelcalDecoder {
    /// New decoder
    ///
    /// Tones within a code may be separated by at most `max_gap`
    /// samples.
    ///
    /// A repeated character which starts no more than
    /// `merge_window` samples after the previous tone ended is
    /// treated as the same tone. The window must cover the
    /// spacing between two *adjacent* detections, with nothing
    /// in between: one frame hop, for tones detected frame by
    /// frame. It must be shorter than the shortest real silence
    /// between tones, or a repeated character in a (malformed)
    /// code would vanish.
    pub fn new(max_gap: u64, merge_window: u64) -> Self {
        Self {
            max_gap,
            merge_window,
            state: DecoderState::default(),
        }
    }

    /// Maximum inter-tone gap, in samples
    pub fn max_gap(&self) -> u64 {
        self.max_gap
    }

    /// Current state
    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Accept a tone event
    ///
    /// Events must arrive in order of their start times. If the
    /// sequence in progress had already expired when `event`
    /// started, the partial sequence is abandoned, `event` starts
    /// a new sequence, and the abandonment is returned. Call
    /// [`idle()`](Self::idle) with the event's start time first
    /// to observe both.
    pub fn input(&mut self, event: &ToneEvent) -> CodeState {
        if let Some(last) = self.state.last.as_mut() {
            if last.data.character == event.character
                && event.start <= last.data.end.saturating_add(self.merge_window)
            {
                debug!(
                    "decoder [{:<14}]: '{}' continues previous tone",
                    event.start, event.character
                );
                last.data.end = u64::max(last.data.end, event.end);
                last.deadline = last.data.end.saturating_add(self.max_gap);
                return self.current();
            }
        }

        let abandoned = self.expire(event.start);

        if self.state.buffer.is_empty() {
            self.state.first_start = event.start;
            self.set_phase(DecoderPhase::Accumulating);
        }
        self.state.buffer.push(event.character);
        self.state.last = Some(TimedData::with_deadline(
            *event,
            event.end.saturating_add(self.max_gap),
        ));

        if self.state.buffer.len() == CODE_LENGTH {
            self.set_phase(DecoderPhase::Complete);
            let code = DecodedCode::new(self.state.partial(), self.state.first_start, event.end);
            self.state.buffer.clear();
            self.state.last = None;
            self.set_phase(DecoderPhase::Idle);
            return abandoned.unwrap_or(CodeState::Decoded(code));
        }

        abandoned.unwrap_or_else(|| self.current())
    }

    /// Check timeouts
    ///
    /// `now` is the current input sample count; it must not
    /// decrease. If the sequence in progress has expired, it is
    /// abandoned and reported. Otherwise reports the current state.
    pub fn idle(&mut self, now: u64) -> CodeState {
        self.expire(now).unwrap_or_else(|| self.current())
    }

    /// Reset to initial conditions, discarding any sequence
    pub fn reset(&mut self) {
        self.state = DecoderState::default();
    }

    fn current(&self) -> CodeState {
        if self.state.buffer.is_empty() {
            CodeState::Idle
        } else {
            CodeState::Accumulating(self.state.partial())
        }
    }

    fn expire(&mut self, now: u64) -> Option<CodeState> {
        if self.state.buffer.is_empty() {
            return None;
        }
        let last = self.state.last.as_ref()?;
        if !last.is_expired_at(now) {
            return None;
        }

        let out = AbandonedSequence {
            partial: self.state.partial(),
            first_start: self.state.first_start,
            last_end: last.data.end,
            abandoned_at: now,
            reason: AbandonReason::Timeout,
        };
        self.state.buffer.clear();
        self.state.last = None;
        self.set_phase(DecoderPhase::Idle);
        Some(CodeState::Abandoned(out))
    }

    fn set_phase(&mut self, phase: DecoderPhase) {
        if self.state.phase != phase {
            debug!(
                "decoder: {} -> {}",
                self.state.phase.as_ref(),
                phase.as_ref()
            );
            self.state.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: u64 = 16000;
    const HOP: u64 = 256;

    fn tone(character: char, start: u64, end: u64) -> ToneEvent {
        ToneEvent {
            character,
            start,
            end,
            confidence: 1.0,
            frames: ((end - start) / HOP + 1) as u32,
        }
    }

    // four tones, each 8000 samples long, separated by `gap`
    fn sequence(code: &str, t0: u64, gap: u64) -> Vec<ToneEvent> {
        code.chars()
            .enumerate()
            .map(|(i, c)| {
                let start = t0 + i as u64 * (8000 + gap);
                tone(c, start, start + 8000)
            })
            .collect()
    }

    fn decode_all(uut: &mut SelcalDecoder, events: &[ToneEvent]) -> Vec<CodeState> {
        events.iter().map(|evt| uut.input(evt)).collect()
    }

    #[test]
    fn test_decode() {
        let mut uut = SelcalDecoder::new(GAP, HOP);
        assert_eq!(DecoderPhase::Idle, uut.state().phase());

        let out = decode_all(&mut uut, &sequence("AMBC", 1000, 1600));
        assert_eq!(CodeState::Accumulating("A".to_owned()), out[0]);
        assert_eq!(CodeState::Accumulating("AMB".to_owned()), out[2]);
        assert_eq!(DecoderPhase::Idle, uut.state().phase());
        match &out[3] {
            CodeState::Decoded(code) => {
                assert_eq!("AMBC", code.as_str());
                assert_eq!(1000, code.start());
                assert_eq!(1000 + 3 * 9600 + 8000, code.end());
                assert!(code.has_unique_characters());
            }
            _ => unreachable!(),
        }
        assert!(uut.state().buffer().is_empty());
        assert_eq!(CodeState::Idle, uut.idle(1_000_000));
    }

    #[test]
    fn test_gap_boundary() {
        // gap of exactly max_gap is accepted
        let mut uut = SelcalDecoder::new(GAP, HOP);
        uut.input(&tone('A', 0, 8000));
        assert_eq!(
            CodeState::Accumulating("A".to_owned()),
            uut.idle(8000 + GAP)
        );
        assert_eq!(
            CodeState::Accumulating("AB".to_owned()),
            uut.input(&tone('B', 8000 + GAP, 16000 + GAP))
        );

        // one sample more is not
        let mut uut = SelcalDecoder::new(GAP, HOP);
        uut.input(&tone('A', 0, 8000));
        match uut.input(&tone('B', 8001 + GAP, 16000 + GAP)) {
            CodeState::Abandoned(seq) => {
                assert_eq!("A", seq.partial());
                assert_eq!(0, seq.first_start());
                assert_eq!(8000, seq.last_end());
                assert_eq!(8001 + GAP, seq.abandoned_at());
                assert_eq!(AbandonReason::Timeout, seq.reason());
            }
            _ => unreachable!(),
        }
        assert_eq!(&['B'], uut.state().buffer());
        assert_eq!(DecoderPhase::Accumulating, uut.state().phase());
    }

    #[test]
    fn test_idle_timeout() {
        let mut uut = SelcalDecoder::new(GAP, HOP);
        uut.input(&tone('A', 0, 8000));
        uut.input(&tone('B', 9000, 17000));
        assert_eq!(
            CodeState::Accumulating("AB".to_owned()),
            uut.idle(17000 + GAP)
        );
        match uut.idle(17001 + GAP) {
            CodeState::Abandoned(seq) => {
                assert_eq!("AB", seq.partial());
                assert_eq!("timeout", seq.reason().as_ref());
            }
            _ => unreachable!(),
        }
        assert_eq!(CodeState::Idle, uut.idle(17002 + GAP));
        assert_eq!(DecoderPhase::Idle, uut.state().phase());
    }

    #[test]
    fn test_duplicate_merged() {
        let mut uut = SelcalDecoder::new(GAP, HOP);
        uut.input(&tone('A', 0, 4000));

        // same tone, split by the debouncer
        assert_eq!(
            CodeState::Accumulating("A".to_owned()),
            uut.input(&tone('A', 4000 + HOP, 8000))
        );
        assert_eq!(Some(8000), uut.state().last_end());

        // gap is measured from the real end of the tone
        assert_eq!(
            CodeState::Accumulating("A".to_owned()),
            uut.idle(8000 + GAP)
        );

        // the same character after a real gap is a new character
        assert_eq!(
            CodeState::Accumulating("AA".to_owned()),
            uut.input(&tone('A', 9000, 17000))
        );
    }

    #[test]
    fn test_resume_after_code() {
        let mut uut = SelcalDecoder::new(GAP, HOP);
        let out = decode_all(&mut uut, &sequence("ABCD", 0, 1600));
        assert!(matches!(out[3], CodeState::Decoded(_)));

        let out = decode_all(&mut uut, &sequence("EFGH", 40000, 1600));
        assert_eq!(CodeState::Accumulating("E".to_owned()), out[0]);
        match &out[3] {
            CodeState::Decoded(code) => {
                assert_eq!("EFGH", code.as_str());
                assert_eq!(40000, code.start());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_reset() {
        let mut uut = SelcalDecoder::new(GAP, HOP);
        uut.input(&tone('A', 0, 8000));
        uut.reset();
        assert_eq!(DecoderState::default(), *uut.state());
        assert_eq!(CodeState::Idle, uut.idle(100_000));
    }

    #[test]
    fn test_unique_characters() {
        assert!(DecodedCode::new("AMBC", 0, 1).has_unique_characters());
        assert!(!DecodedCode::new("ABAC", 0, 1).has_unique_characters());
        assert!(!DecodedCode::new("AABC", 0, 1).has_unique_characters());
    }

    #[test]
    fn test_display() {
        let code = DecodedCode::new("AMBC", 10, 20);
        assert_eq!("AMBC", &format!("{}", code));
        assert_eq!(
            "decoded: \"AMBC\" [10, 20]",
            &format!("{}", CodeState::Decoded(code))
        );
        assert_eq!(
            "no tone within the maximum inter-tone gap",
            AbandonReason::Timeout.as_display_str()
        );
    }

    #[test]
    fn test_no_merge_across_codes() {
        let mut uut = SelcalDecoder::new(GAP, HOP);
        let out = decode_all(&mut uut, &sequence("ABCD", 0, 1600));
        assert!(matches!(out[3], CodeState::Decoded(_)));
        assert_eq!(None, uut.state().last_end());

        // an adjacent 'D' after a complete code starts a new one
        let end = out_end(&out[3]);
        assert_eq!(
            CodeState::Accumulating("D".to_owned()),
            uut.input(&tone('D', end + HOP, end + 8000))
        );
    }

    #[test]
    fn test_dropout_through_debouncer() {
        use super::super::debounce::BurstDebouncer;
        use super::super::matcher::MatchResult;

        let mut frames = vec![MatchResult::Matched('A', 0.9); 15];
        frames.push(MatchResult::Ambiguous);
        frames.extend([MatchResult::Matched('A', 0.9); 15]);
        frames.push(MatchResult::NoMatch);

        let mut debouncer = BurstDebouncer::new(HOP, 8 * HOP, 5);
        let mut uut = SelcalDecoder::new(GAP, HOP);
        let mut tones = 0;
        for (i, res) in frames.iter().enumerate() {
            if let Some(evt) = debouncer.input(res, i as u64 * HOP) {
                tones += 1;
                uut.input(&evt);
            }
        }
        assert_eq!(1, tones);
        assert_eq!(CodeState::Accumulating("A".to_owned()), uut.idle(32 * HOP));
    }

    fn out_end(state: &CodeState) -> u64 {
        match state {
            CodeState::Decoded(code) => code.end(),
            _ => unreachable!(),
        }
    }
}
