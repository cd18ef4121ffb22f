//! # selcal: SELCAL tone decoding
//!
//! This crate provides a decoder for
//! [Selective Calling](https://en.wikipedia.org/wiki/SELCAL)
//! (SELCAL) tones, the aeronautical paging system standardized by
//! ICAO. It detects SELCAL transmissions in an audio signal and
//! reports the four-character codes to the caller.
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! This crate has not been certified as an aircraft SELCAL decoder or
//! for any other purpose. It is intended for monitoring and hobby use.
//! Never rely on it to receive a call.
//!
//! ## Example
//!
//! You will first need to recover *baseband audio* from an HF or VHF
//! aeronautical receiver, via a line out jack or a software-defined
//! radio. Obtaining the audio is beyond the scope of this crate. If you
//! have a stereo signal, mix to mono first.
//!
//! Each SELCAL character is a pair of simultaneous tones. The
//! [`ReferenceTable`] says which tones make up which character:
//!
//! ```
//! use selcal::{ReferenceTable, SelcalReceiverBuilder, Tolerance, ICAO_TONES};
//!
//! # let some_audio_source_iterator = || std::iter::once(0.0f32);
//! #
//! // character k is made from tones k and k+5
//! let table = ReferenceTable::new(
//!     ICAO_TONES.iter().map(|&(_, hz)| hz),
//!     (0..16).map(|k| (ICAO_TONES[k].0, ICAO_TONES[k].1, ICAO_TONES[(k + 5) % 16].1)),
//!     Tolerance::Fraction(0.015),
//! )
//! .expect("invalid table");
//!
//! // create a SelcalReceiver with your audio sampling rate
//! let mut rx = SelcalReceiverBuilder::new(8000)
//!     .with_min_sustain(0.25)     // seconds a tone must be held
//!     .with_max_gap(2.0)          // seconds allowed between tones
//!     .build(table);
//!
//! // let audiosrc be an iterator which outputs audio samples,
//! // in f32 format at the sampling rate (here 8000 Hz)
//! let audiosrc = some_audio_source_iterator();
//! for evt in rx.iter(audiosrc) {
//!     if let Some(code) = evt.code() {
//!         println!("SELCAL {}", code);
//!     } else if let Some(partial) = evt.abandoned() {
//!         println!("incomplete call: {}", partial);
//!     }
//! }
//! ```
//!
//! The receiver is created via a [builder](SelcalReceiverBuilder).
//!
//! The [`SelcalReceiver`] binds by iterator to any source of `f32` PCM
//! mono (1-channel) audio samples. If you're using `i16` samples (as
//! most sound cards do), you'll need to convert them to `f32` and
//! scale them to about `[-1.0, 1.0]`.
//!
//! The iterator consumes as many samples as possible until the next
//! [`SelcalReceiverEvent`]. Events include every sustained tone, every
//! change to the code in progress, and every complete or abandoned
//! code.
//!
//! If audio is captured on a separate thread, use a
//! [`block_queue()`] to pass it to [`run_pipeline()`]. The queue is
//! bounded and drops the oldest audio when the decoder falls behind.
//!
//! ## Background
//!
//! SELCAL lets a ground station call one aircraft on a shared HF or
//! VHF channel without the crew having to listen to every
//! transmission. Each aircraft is assigned a four-character code.
//! The ground station sends each character as a pair of
//! simultaneous tones, held for about a second, with short
//! silences between characters. The airborne decoder alerts the
//! crew when it hears its own code.
//!
//! Tones are drawn from sixteen audio frequencies between 312.6 Hz
//! and 1479.1 Hz, labeled `A` through `S` (without `I`, `N`, or
//! `O`). See [`ICAO_TONES`]. This crate finds each tone pair,
//! looks up its character in the [`ReferenceTable`], and reports
//! the code once four characters have arrived.

mod builder;
mod pipeline;
mod receiver;
mod table;

pub use builder::SelcalReceiverBuilder;
pub use pipeline::{
    block_queue, run_pipeline, BlockReceiver, BlockSender, PipelineStats, QueueClosed,
    SampleBlock, ShutdownHandle,
};
pub use receiver::{
    AbandonReason, AbandonedSequence, BurstDebouncer, CodeState, DecodedCode, DecoderPhase,
    DecoderState, MatchResult, Peak, PeakExtractor, PeakPair, SelcalDecoder, SelcalEventType,
    SelcalReceiver, SelcalReceiverEvent, SourceIter, SpectralAnalyzer, SpectrumFrame,
    ToneEvent, ToneMatcher, CODE_LENGTH,
};
pub use table::{CharacterPair, ReferenceTable, TableError, Tolerance, ICAO_TONES};
