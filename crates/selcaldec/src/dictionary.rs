//! Assignee dictionary
//!
//! Maps SELCAL codes to the aircraft they are assigned to. The
//! file is tab-separated text, one assignment per line:
//!
//! ```txt
//! CODE<TAB>registration<TAB>aircraft type<TAB>operator
//! ```
//!
//! Lines with fewer than four fields are ignored. Extra fields
//! are ignored, too.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::Context;
use log::info;

/// Lookup table from code to assignee description
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dictionary(HashMap<String, String>);

impl Dictionary {
    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Unable to open --dictionary \"{}\"", path.display()))?;
        let out = Self::parse(std::io::BufReader::new(file))
            .with_context(|| format!("Unable to read --dictionary \"{}\"", path.display()))?;
        info!("loaded {} SELCAL assignments", out.len());
        Ok(out)
    }

    /// Parse from tab-separated text
    ///
    /// Bytes which are not valid UTF-8 are replaced.
    pub fn parse<R>(mut reader: R) -> std::io::Result<Self>
    where
        R: BufRead,
    {
        let mut out = HashMap::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let fields: Vec<&str> = line.trim().split('\t').collect();
            if fields.len() < 4 {
                continue;
            }
            out.insert(
                fields[0].trim().to_owned(),
                format!("({} {} {})", fields[1], fields[2], fields[3]),
            );
        }
        Ok(Self(out))
    }

    /// Describe the assignee of `code`, like "`(G-ABCD B744 Example Air)`"
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.0.get(code).map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
