//! Reference table files
//!
//! A table file is JSON. Tones are named, and each character
//! names its two tones:
//!
//! ```txt
//! {
//!   "tones": { "A": 312.6, "B": 346.7, "F": 524.8, ... },
//!   "characters": { "A": ["A", "F"], ... }
//! }
//! ```
//!
//! Tone names are only labels. They need not match the
//! characters.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use log::info;
use serde::Deserialize;

use selcal::{ReferenceTable, Tolerance};

/// The sixteen ICAO tones, with character k on tones k and k+5
const BUILTIN_TABLE: &str = include_str!("../tables/selcal16.json");

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    tones: BTreeMap<String, f32>,
    characters: BTreeMap<String, [String; 2]>,
}

/// Load the reference table from `path`, or the built-in table
pub fn load(path: Option<&Path>, tolerance: Tolerance) -> Result<ReferenceTable, anyhow::Error> {
    match path {
        Some(path) => {
            info!("loading reference table: \"{}\"", path.display());
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read --table \"{}\"", path.display()))?;
            parse(&json, tolerance)
                .with_context(|| format!("Invalid --table \"{}\"", path.display()))
        }
        None => {
            info!("using built-in reference table");
            parse(BUILTIN_TABLE, tolerance)
        }
    }
}

/// Parse and validate a JSON reference table
pub fn parse(json: &str, tolerance: Tolerance) -> Result<ReferenceTable, anyhow::Error> {
    let file: TableFile = serde_json::from_str(json).context("malformed table JSON")?;

    let mut characters = Vec::with_capacity(file.characters.len());
    for (name, [t0, t1]) in &file.characters {
        let character = single_char(name)?;
        let f0 = tone(&file, name, t0)?;
        let f1 = tone(&file, name, t1)?;
        characters.push((character, f0, f1));
    }

    Ok(ReferenceTable::new(
        file.tones.values().copied(),
        characters,
        tolerance,
    )?)
}

fn single_char(name: &str) -> Result<char, anyhow::Error> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(anyhow!(
            "character \"{}\" must be exactly one character long",
            name
        )),
    }
}

fn tone(file: &TableFile, character: &str, name: &str) -> Result<f32, anyhow::Error> {
    file.tones
        .get(name)
        .copied()
        .ok_or_else(|| anyhow!("character \"{}\" uses unknown tone \"{}\"", character, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_builtin() {
        let table = load(None, Tolerance::default()).expect("built-in table");
        assert_eq!(16, table.len());
        assert_eq!(16, table.tones().len());
        assert_eq!(Some((312.6, 524.8)), table.pair_for('A'));
        assert_eq!(Some((312.6, 977.2)), table.pair_for('M'));
        assert_eq!(Some((473.2, 1479.1)), table.pair_for('S'));
        for (letter, hz) in selcal::ICAO_TONES {
            assert!(table.tones().contains(&hz), "tone {}", letter);
        }
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"tones": {{"lo": 600.0, "hi": 1200.0, "top": 2000.0}},
                "characters": {{"X": ["lo", "hi"], "Y": ["top", "lo"]}}}}"#
        )
        .expect("write");

        let table = load(Some(file.path()), Tolerance::Hertz(10.0)).expect("table");
        assert_eq!(2, table.len());
        assert_eq!(Some((600.0, 2000.0)), table.pair_for('Y'));
        assert_eq!(Tolerance::Hertz(10.0), table.tolerance());

        assert!(load(Some(Path::new("/nonexistent/table.json")), Tolerance::default()).is_err());
    }

    #[test]
    fn test_invalid() {
        let tol = Tolerance::default();

        // not JSON
        assert!(parse("tones", tol).is_err());

        // unknown tone name
        assert!(parse(
            r#"{"tones": {"A": 300.0, "B": 400.0}, "characters": {"X": ["A", "C"]}}"#,
            tol
        )
        .is_err());

        // multi-character key
        assert!(parse(
            r#"{"tones": {"A": 300.0, "B": 400.0}, "characters": {"XY": ["A", "B"]}}"#,
            tol
        )
        .is_err());

        // two characters share a pair
        let err = parse(
            r#"{"tones": {"A": 300.0, "B": 400.0},
                "characters": {"X": ["A", "B"], "Y": ["B", "A"]}}"#,
            tol,
        )
        .expect_err("duplicate pair");
        assert!(format!("{}", err).contains("share"));

        // overlapping tolerance bands
        assert!(parse(
            r#"{"tones": {"A": 300.0, "B": 301.0}, "characters": {"X": ["A", "B"]}}"#,
            tol
        )
        .is_err());
    }
}
