//! Tone pair matching
//!
//! The [`ToneMatcher`] maps the two strongest peaks of a frame to
//! a character of the [`ReferenceTable`]. Each peak must lie in
//! the tolerance band of some reference tone, and the two tones
//! must form a pair that the table maps to a character. Anything
//! else is [`Ambiguous`](MatchResult::Ambiguous): the matcher never
//! guesses.

use std::sync::Arc;

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

use super::peaks::PeakPair;
use crate::table::ReferenceTable;

/// Outcome of matching one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchResult {
    /// Fewer than two significant peaks
    NoMatch,

    /// Significant energy that is not a valid character
    ///
    /// More than two peaks, a peak outside every tolerance band,
    /// a pair of tones which encodes no character, or a pair
    /// with badly unbalanced magnitudes.
    Ambiguous,

    /// A valid character, with confidence in `[0, 1]`
    Matched(char, f32),
}

impl MatchResult {
    /// Matched character, if any
    pub fn character(&self) -> Option<char> {
        match self {
            MatchResult::Matched(c, _) => Some(*c),
            _ => None,
        }
    }

    /// Match confidence, or zero if there is no match
    pub fn confidence(&self) -> f32 {
        match self {
            MatchResult::Matched(_, conf) => *conf,
            _ => 0.0,
        }
    }
}

impl AsRef<str> for MatchResult {
    fn as_ref(&self) -> &str {
        match self {
            MatchResult::NoMatch => "no match",
            MatchResult::Ambiguous => "ambiguous",
            MatchResult::Matched(_, _) => "matched",
        }
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchResult::Matched(c, conf) => {
                write!(f, "{} '{}' ({:.2})", self.as_ref(), c, conf)
            }
            _ => write!(f, "{}", self.as_ref()),
        }
    }
}

/// Matches peak pairs against a reference table
#[derive(Clone, Debug)]
pub struct ToneMatcher {
    table: Arc<ReferenceTable>,
    max_imbalance: f32,
}

impl ToneMatcher {
    /// New matcher
    ///
    /// A pair whose stronger peak is more than `max_imbalance`
    /// times the weaker one is rejected.
    pub fn new(table: Arc<ReferenceTable>, max_imbalance: f32) -> Self {
        Self {
            table,
            max_imbalance: f32::max(max_imbalance, 1.0),
        }
    }

    /// Reference table
    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// Match one frame's peaks
    pub fn input(&self, pair: &PeakPair) -> MatchResult {
        let peaks = pair.peaks();
        if peaks.len() < 2 {
            return MatchResult::NoMatch;
        }
        if pair.qualifying() > 2 {
            trace!(
                "matcher [{:<14}]: {} significant peaks",
                pair.timestamp(),
                pair.qualifying()
            );
            return MatchResult::Ambiguous;
        }

        let (first, second) = (peaks[0], peaks[1]);
        let (i0, i1) = match (
            self.table.tone_index(first.frequency),
            self.table.tone_index(second.frequency),
        ) {
            (Some(i0), Some(i1)) if i0 != i1 => (i0, i1),
            _ => {
                trace!(
                    "matcher [{:<14}]: peaks {:.1} Hz, {:.1} Hz fit no tone pair",
                    pair.timestamp(),
                    first.frequency,
                    second.frequency
                );
                return MatchResult::Ambiguous;
            }
        };

        let character = match self.table.character_for_tones(i0, i1) {
            Some(c) => c,
            None => return MatchResult::Ambiguous,
        };

        let (strong, weak) = (
            f32::max(first.magnitude, second.magnitude),
            f32::min(first.magnitude, second.magnitude),
        );
        if weak <= 0.0 || strong > self.max_imbalance * weak {
            trace!(
                "matcher [{:<14}]: '{}' rejected for imbalance {:.1}",
                pair.timestamp(),
                character,
                strong / weak
            );
            return MatchResult::Ambiguous;
        }

        let tones = self.table.tones();
        let tolerance = self.table.tolerance();
        let closeness = 0.5
            * (tolerance.closeness(tones[i0], first.frequency)
                + tolerance.closeness(tones[i1], second.frequency));
        let balance = 0.5 + 0.5 * weak / strong;

        MatchResult::Matched(character, f32::clamp(closeness * balance, 0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use super::super::peaks::Peak;
    use crate::table::tests::icao_table;

    fn table() -> Arc<ReferenceTable> {
        Arc::new(icao_table())
    }

    fn pair(peaks: &[(f32, f32)], qualifying: usize) -> PeakPair {
        PeakPair::new(
            peaks.iter().map(|&(frequency, magnitude)| Peak {
                frequency,
                magnitude,
            }),
            qualifying,
            0,
        )
    }

    #[test]
    fn test_every_character() {
        let uut = ToneMatcher::new(table(), 4.0);
        for chr in uut.table().characters() {
            // either order of peaks
            let res = uut.input(&pair(&[(chr.low_hz, 0.2), (chr.high_hz, 0.2)], 2));
            assert_eq!(Some(chr.character), res.character());
            assert_approx_eq!(res.confidence(), 1.0);

            let res = uut.input(&pair(&[(chr.high_hz, 0.2), (chr.low_hz, 0.19)], 2));
            assert_eq!(Some(chr.character), res.character());
        }
    }

    #[test]
    fn test_confidence() {
        let uut = ToneMatcher::new(table(), 4.0);

        // off-frequency and unbalanced
        let res = uut.input(&pair(&[(312.6 * 1.0075, 0.2), (524.8, 0.1)], 2));
        assert_eq!(Some('A'), res.character());
        assert_approx_eq!(res.confidence(), 0.75 * 0.75, 1.0e-3);
    }

    #[test]
    fn test_no_match() {
        let uut = ToneMatcher::new(table(), 4.0);
        assert_eq!(MatchResult::NoMatch, uut.input(&pair(&[], 0)));
        assert_eq!(MatchResult::NoMatch, uut.input(&pair(&[(312.6, 0.2)], 1)));
    }

    #[test]
    fn test_ambiguous() {
        let uut = ToneMatcher::new(table(), 4.0);

        // three significant peaks
        assert_eq!(
            MatchResult::Ambiguous,
            uut.input(&pair(&[(312.6, 0.2), (524.8, 0.2)], 3))
        );

        // A and B tones are not a pair
        assert_eq!(
            MatchResult::Ambiguous,
            uut.input(&pair(&[(312.6, 0.2), (346.7, 0.2)], 2))
        );

        // one peak between tones
        assert_eq!(
            MatchResult::Ambiguous,
            uut.input(&pair(&[(330.0, 0.2), (524.8, 0.2)], 2))
        );

        // both peaks on the same tone
        assert_eq!(
            MatchResult::Ambiguous,
            uut.input(&pair(&[(312.6, 0.2), (313.0, 0.2)], 2))
        );

        // too unbalanced
        assert_eq!(
            MatchResult::Ambiguous,
            uut.input(&pair(&[(312.6, 0.5), (524.8, 0.1)], 2))
        );
    }
}
