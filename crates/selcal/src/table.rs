//! SELCAL reference tone table
//!
//! The [`ReferenceTable`] holds the set of known tone frequencies
//! and the mapping from each SELCAL character to the unordered
//! pair of tones which represents it. The table is built once,
//! validated, and never changes afterwards. The
//! [tone matcher](crate::ToneMatcher) refers to it read-only.
//!
//! ```
//! use selcal::{ReferenceTable, Tolerance};
//!
//! let table = ReferenceTable::new(
//!     [312.6, 346.7, 384.6],
//!     [('A', 312.6, 346.7), ('B', 346.7, 384.6)],
//!     Tolerance::Fraction(0.015),
//! )
//! .expect("valid table");
//!
//! assert_eq!(Some((312.6, 346.7)), table.pair_for('A'));
//! assert_eq!(Some('B'), table.character_for_tones(2, 1));
//! assert_eq!(Some(0), table.tone_index(313.1));
//! assert_eq!(None, table.tone_index(330.0));
//! ```

use std::fmt;

use thiserror::Error;

/// The sixteen ICAO SELCAL tone frequencies, by tone letter
///
/// These are the audio frequencies (Hz) assigned by ICAO
/// Annex 10 to the tone letters `A` through `S`. The letters
/// `I`, `N`, and `O` are not used.
pub const ICAO_TONES: [(char, f32); 16] = [
    ('A', 312.6),
    ('B', 346.7),
    ('C', 384.6),
    ('D', 426.6),
    ('E', 473.2),
    ('F', 524.8),
    ('G', 582.1),
    ('H', 645.7),
    ('J', 716.1),
    ('K', 794.3),
    ('L', 881.0),
    ('M', 977.2),
    ('P', 1083.9),
    ('Q', 1202.3),
    ('R', 1333.5),
    ('S', 1479.1),
];

/// Frequency tolerance for matching a peak to a reference tone
///
/// The tolerance must be wider than the frequency error of the
/// spectral analyzer but narrower than half the spacing between
/// any two reference tones. The [`ReferenceTable`] refuses to
/// build if two tolerance bands would overlap.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum Tolerance {
    /// Fraction of the reference frequency, like `0.015` for ±1.5%
    Fraction(f32),

    /// Fixed band, in Hz, on either side of the reference frequency
    Hertz(f32),
}

impl Tolerance {
    /// Half-width of the tolerance band around `reference_hz`
    pub fn band_hz(&self, reference_hz: f32) -> f32 {
        match *self {
            Tolerance::Fraction(frac) => frac.abs() * reference_hz,
            Tolerance::Hertz(hz) => hz.abs(),
        }
    }

    /// True if `freq_hz` lies within the band around `reference_hz`
    pub fn contains(&self, reference_hz: f32, freq_hz: f32) -> bool {
        (freq_hz - reference_hz).abs() <= self.band_hz(reference_hz)
    }

    /// Closeness of `freq_hz` to `reference_hz`
    ///
    /// Returns `1.0` for an exact match, falling linearly to
    /// `0.0` at the edge of the band and beyond.
    pub fn closeness(&self, reference_hz: f32, freq_hz: f32) -> f32 {
        let band = self.band_hz(reference_hz);
        if band <= 0.0 {
            return (freq_hz == reference_hz) as u8 as f32;
        }
        f32::clamp(1.0 - (freq_hz - reference_hz).abs() / band, 0.0, 1.0)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Fraction(0.015)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tolerance::Fraction(frac) => write!(f, "±{:.2}%", 100.0 * frac),
            Tolerance::Hertz(hz) => write!(f, "±{:.1} Hz", hz),
        }
    }
}

/// A character and the two tones which encode it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterPair {
    /// SELCAL character
    pub character: char,

    /// Lower tone frequency (Hz)
    pub low_hz: f32,

    /// Higher tone frequency (Hz)
    pub high_hz: f32,
}

/// Reference table construction error
///
/// A malformed table would break the uniqueness of tone
/// matching, so it is rejected before any decoding starts.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum TableError {
    /// The table has no tones
    #[error("reference table has no tones")]
    NoTones,

    /// The table maps no characters
    #[error("reference table maps no characters")]
    NoCharacters,

    /// A frequency is zero, negative, or not finite
    #[error("tone frequency {0} Hz is not a positive, finite number")]
    InvalidFrequency(f32),

    /// The same tone frequency is listed twice
    #[error("tone {0} Hz appears more than once")]
    DuplicateTone(f32),

    /// Two tones are too close together for the tolerance
    #[error("tones {0} Hz and {1} Hz have overlapping tolerance bands")]
    OverlappingTones(f32, f32),

    /// A character refers to a frequency which is not a tone
    #[error("character '{0}' uses {1} Hz, which is not a reference tone")]
    UnknownTone(char, f32),

    /// A character uses the same tone twice
    #[error("character '{0}' must use two distinct tones")]
    RepeatedTone(char),

    /// A character is mapped more than once
    #[error("character '{0}' is mapped more than once")]
    DuplicateCharacter(char),

    /// Two characters share the same tone pair
    #[error("characters '{0}' and '{1}' share the same tone pair")]
    DuplicatePair(char, char),
}

/// Immutable SELCAL reference table
///
/// Tones are stored in ascending order of frequency, and each
/// character is stored with the indices of its two tones. See
/// [module documentation](self) for an example.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceTable {
    tones: Vec<f32>,
    characters: Vec<(char, usize, usize)>,
    tolerance: Tolerance,
}

impl ReferenceTable {
    /// Build and validate a reference table
    ///
    /// `tones` lists every reference frequency, in Hz, in any
    /// order. `characters` lists each character with the two
    /// frequencies that encode it, which must be drawn from
    /// `tones`, in either order. The `tolerance` is the band
    /// within which a detected peak matches a tone.
    pub fn new<T, C>(tones: T, characters: C, tolerance: Tolerance) -> Result<Self, TableError>
    where
        T: IntoIterator<Item = f32>,
        C: IntoIterator<Item = (char, f32, f32)>,
    {
        let mut tones: Vec<f32> = tones.into_iter().collect();
        if tones.is_empty() {
            return Err(TableError::NoTones);
        }
        if let Some(&bad) = tones.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(TableError::InvalidFrequency(bad));
        }
        tones.sort_by(f32::total_cmp);

        for adjacent in tones.windows(2) {
            let (lo, hi) = (adjacent[0], adjacent[1]);
            if lo == hi {
                return Err(TableError::DuplicateTone(lo));
            }
            if lo + tolerance.band_hz(lo) >= hi - tolerance.band_hz(hi) {
                return Err(TableError::OverlappingTones(lo, hi));
            }
        }

        let mut mapped: Vec<(char, usize, usize)> = Vec::new();
        for (character, f0, f1) in characters {
            let i0 = exact_index(&tones, f0).ok_or(TableError::UnknownTone(character, f0))?;
            let i1 = exact_index(&tones, f1).ok_or(TableError::UnknownTone(character, f1))?;
            if i0 == i1 {
                return Err(TableError::RepeatedTone(character));
            }
            let (lo, hi) = (usize::min(i0, i1), usize::max(i0, i1));

            for &(other, olo, ohi) in &mapped {
                if other == character {
                    return Err(TableError::DuplicateCharacter(character));
                }
                if (olo, ohi) == (lo, hi) {
                    return Err(TableError::DuplicatePair(other, character));
                }
            }
            mapped.push((character, lo, hi));
        }
        if mapped.is_empty() {
            return Err(TableError::NoCharacters);
        }
        mapped.sort_by_key(|&(character, _, _)| character);

        Ok(Self {
            tones,
            characters: mapped,
            tolerance,
        })
    }

    /// Reference tones, in ascending order (Hz)
    pub fn tones(&self) -> &[f32] {
        &self.tones
    }

    /// Matching tolerance
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Number of characters in the table
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// True if the table maps no characters (never, once built)
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Iterate over every character, in character order
    pub fn characters(&self) -> impl ExactSizeIterator<Item = CharacterPair> + '_ {
        self.characters
            .iter()
            .map(move |&(character, lo, hi)| CharacterPair {
                character,
                low_hz: self.tones[lo],
                high_hz: self.tones[hi],
            })
    }

    /// Find the tone whose tolerance band contains `freq_hz`
    ///
    /// Returns the index of the tone in [`tones()`](Self::tones).
    /// Since bands never overlap, at most one tone can match.
    pub fn tone_index(&self, freq_hz: f32) -> Option<usize> {
        self.tones
            .iter()
            .position(|&tone| self.tolerance.contains(tone, freq_hz))
    }

    /// Character encoded by the given pair of tone indices
    ///
    /// The indices may be given in either order.
    pub fn character_for_tones(&self, a: usize, b: usize) -> Option<char> {
        let key = (usize::min(a, b), usize::max(a, b));
        self.characters
            .iter()
            .find(|&&(_, lo, hi)| (lo, hi) == key)
            .map(|&(character, _, _)| character)
    }

    /// Tone pair `(low, high)` for the given `character`, in Hz
    pub fn pair_for(&self, character: char) -> Option<(f32, f32)> {
        self.characters
            .iter()
            .find(|&&(c, _, _)| c == character)
            .map(|&(_, lo, hi)| (self.tones[lo], self.tones[hi]))
    }

    /// True if `character` is mapped by this table
    pub fn contains(&self, character: char) -> bool {
        self.pair_for(character).is_some()
    }
}

fn exact_index(tones: &[f32], freq: f32) -> Option<usize> {
    tones.iter().position(|&tone| tone == freq)
}
