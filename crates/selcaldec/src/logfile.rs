//! Code log file
//!
//! Decoded codes are written to the log file newest-first:
//! each new line is inserted at the top.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Newest-first log file
#[derive(Clone, Debug)]
pub struct CodeLog {
    path: PathBuf,
}

impl CodeLog {
    /// Log to the file at `path`, which need not exist yet
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `line` at the top of the log
    pub fn prepend(&self, line: &str) -> io::Result<()> {
        let old = match std::fs::read(&self.path) {
            Ok(old) => old,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut file = io::BufWriter::new(std::fs::File::create(&self.path)?);
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.write_all(&old)?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = CodeLog::new(dir.path().join("selcal_log.txt"));

        log.prepend("01/02/24 10:00:00 AMBC").expect("write");
        log.prepend("01/02/24 10:05:00 DEFG (N123AB A332 Other Lines)")
            .expect("write");

        let contents = std::fs::read_to_string(log.path()).expect("read");
        assert_eq!(
            "01/02/24 10:05:00 DEFG (N123AB A332 Other Lines)\n01/02/24 10:00:00 AMBC\n",
            contents
        );
    }

    #[test]
    fn test_unwritable() {
        let log = CodeLog::new("/nonexistent/dir/selcal_log.txt");
        assert!(log.prepend("x").is_err());
    }
}
