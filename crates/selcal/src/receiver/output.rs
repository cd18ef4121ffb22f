use super::debounce::ToneEvent;
use super::decoder::{AbandonedSequence, CodeState, DecodedCode};

/// SELCAL receiver event
///
/// SELCAL decoding occurs at two separate layers:
///
/// 1. **Tone layer**: the spectral analyzer, peak extractor,
///    tone matcher, and debouncer convert audio into sustained
///    [tones](ToneEvent). Each tone is one character.
///
/// 2. **Code layer**: four tones in sequence, with limited
///    gaps between them, form a [`DecodedCode`].
///
/// The [`what()`](SelcalReceiverEvent::what) method returns the
/// event, which may originate from either layer. You can also
/// query for the [`code()`](SelcalReceiverEvent::code) directly,
/// if one is available now.
#[derive(Clone, Debug, PartialEq)]
pub struct SelcalReceiverEvent {
    what: SelcalEventType,
    input_sample_counter: u64,
}

impl SelcalReceiverEvent {
    /// Successfully-decoded code, if any
    pub fn code(&self) -> Option<&DecodedCode> {
        match self.what() {
            SelcalEventType::Code(CodeState::Decoded(code)) => Some(code),
            _ => None,
        }
    }

    /// Abandoned partial sequence, if any
    pub fn abandoned(&self) -> Option<&AbandonedSequence> {
        match self.what() {
            SelcalEventType::Code(CodeState::Abandoned(seq)) => Some(seq),
            _ => None,
        }
    }

    /// Sustained tone, if any
    ///
    /// Individual tones are reported as soon as they end.
    /// Clients **MUST NOT** report a single tone as a SELCAL
    /// call. Use [`code()`](SelcalReceiverEvent::code) instead.
    pub fn tone(&self) -> Option<&ToneEvent> {
        match self.what() {
            SelcalEventType::Tone(tone) => Some(tone),
            _ => None,
        }
    }

    /// Consume event, returning the decoded code, if any
    pub fn into_code(self) -> Option<DecodedCode> {
        match self.what {
            SelcalEventType::Code(CodeState::Decoded(code)) => Some(code),
            _ => None,
        }
    }

    /// The event which triggered the output
    pub fn what(&self) -> &SelcalEventType {
        &self.what
    }

    /// Event time, measured in input samples
    ///
    /// Reports the "time" of the event using a monotonic count
    /// of input samples.
    pub fn input_sample_counter(&self) -> u64 {
        self.input_sample_counter
    }
}

impl SelcalReceiverEvent {
    /// Create from event and time
    pub(crate) fn new<E>(what: E, input_sample_counter: u64) -> Self
    where
        E: Into<SelcalEventType>,
    {
        Self {
            what: what.into(),
            input_sample_counter,
        }
    }
}

impl From<SelcalReceiverEvent> for Option<DecodedCode> {
    fn from(rx: SelcalReceiverEvent) -> Self {
        rx.into_code()
    }
}

impl std::fmt::Display for SelcalReceiverEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:<14}]: event {}",
            self.input_sample_counter,
            self.what()
        )
    }
}

/// Type of event
///
/// See [`SelcalReceiverEvent`]
#[derive(Clone, Debug, PartialEq)]
pub enum SelcalEventType {
    /// Tone layer event: a sustained tone has ended
    Tone(ToneEvent),

    /// Code layer event
    ///
    /// Reported whenever the code layer changes state: a
    /// character was added to the sequence in progress, a
    /// code was completed, or a partial sequence was
    /// abandoned.
    Code(CodeState),
}

impl From<ToneEvent> for SelcalEventType {
    fn from(inp: ToneEvent) -> Self {
        Self::Tone(inp)
    }
}

impl From<CodeState> for SelcalEventType {
    fn from(inp: CodeState) -> Self {
        Self::Code(inp)
    }
}

impl AsRef<str> for SelcalEventType {
    fn as_ref(&self) -> &str {
        match self {
            SelcalEventType::Tone(_) => "tone",
            SelcalEventType::Code(_) => "code",
        }
    }
}

impl std::fmt::Display for SelcalEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelcalEventType::Tone(evt) => write!(f, "[{}]: {}", self.as_ref(), evt),
            SelcalEventType::Code(evt) => write!(f, "[{}]: {}", self.as_ref(), evt),
        }
    }
}
