//! Capture and reporting
//!
//! The capture thread reads `i16` samples from the input and
//! pushes them into the block queue. The [`Reporter`] receives
//! events from the decoder and prints each new SELCAL call:
//!
//! ```txt
//! 24/05/24 14:03:52 AMBC (G-ABCD B744 Example Air)
//! ```
//!
//! SELCAL codes never repeat a character, so codes which do
//! are discarded. Ground stations often send a call more than
//! once; a code which repeats the last call within the lockout
//! time is printed only once.

use std::io;

use anyhow::Context;
use byteorder::{NativeEndian, ReadBytesExt};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};

use selcal::{BlockSender, DecodedCode, SampleBlock, SelcalReceiverEvent};

use crate::dictionary::Dictionary;
use crate::logfile::CodeLog;

/// Full-scale value of an `i16` sample
const SCALE: f32 = 32768.0;

/// Timestamp format for printed and logged codes
const TIME_FORMAT: &str = "%d/%m/%y %H:%M:%S";

/// Read audio into the block queue
///
/// Reads native-endian `i16` samples from `input` in blocks of
/// `block_size` and pushes them to `tx`. If `lossless`, waits
/// for room in the queue; otherwise the oldest queued block is
/// dropped when the decoder falls behind.
///
/// Returns the number of samples read once the input is
/// exhausted or the pipeline shuts down. A read error shuts
/// down the pipeline and is returned.
pub fn capture<R>(
    mut input: R,
    tx: &BlockSender,
    block_size: usize,
    lossless: bool,
) -> Result<u64, anyhow::Error>
where
    R: io::Read,
{
    let block_size = usize::max(block_size, 1);
    let mut first_sample = 0u64;

    loop {
        let mut samples = Vec::with_capacity(block_size);
        let mut eof = false;
        while samples.len() < block_size {
            match input.read_i16::<NativeEndian>() {
                Ok(sa) => samples.push(sa as f32 / SCALE),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    eof = true;
                    break;
                }
                Err(e) => {
                    error!("capture: read error at sample {}: {}", first_sample, e);
                    tx.shutdown_handle().shutdown();
                    return Err(e).context("Unable to read audio input");
                }
            }
        }

        if !samples.is_empty() {
            let len = samples.len() as u64;
            let block = SampleBlock::new(first_sample, samples);
            let sent = if lossless {
                tx.push_blocking(block)
            } else {
                tx.push(block)
            };
            if sent.is_err() {
                debug!("capture: pipeline shut down");
                return Ok(first_sample);
            }
            first_sample += len;
        }

        if eof {
            info!("capture: end of input after {} samples", first_sample);
            return Ok(first_sample);
        }
    }
}

/// Prints and logs decoded SELCAL codes
#[derive(Debug)]
pub struct Reporter {
    dictionary: Dictionary,
    log: Option<CodeLog>,
    lockout: u64,
    quiet: bool,
    last: Option<(String, u64)>,
}

impl Reporter {
    /// New reporter
    ///
    /// A code which repeats the last printed code, starting
    /// less than `lockout` samples after the printed code
    /// ended, is suppressed.
    pub fn new(dictionary: Dictionary, log: Option<CodeLog>, lockout: u64, quiet: bool) -> Self {
        Self {
            dictionary,
            log,
            lockout,
            quiet,
            last: None,
        }
    }

    /// Handle any receiver event
    pub fn report(&mut self, evt: &SelcalReceiverEvent) {
        if let Some(code) = evt.code() {
            self.report_code(code);
        } else if let Some(partial) = evt.abandoned() {
            warn!(
                "[{:<14}]: abandoned partial code \"{}\": {}",
                partial.abandoned_at(),
                partial.partial(),
                partial.reason().as_display_str()
            );
        } else if let Some(tone) = evt.tone() {
            debug!("{}", tone);
        }
    }

    /// Handle a decoded code
    ///
    /// Returns the line printed, if the code was accepted.
    pub fn report_code(&mut self, code: &DecodedCode) -> Option<String> {
        if !self.accept(code) {
            return None;
        }

        let line = self.format_line(&Local::now(), code);
        if !self.quiet {
            println!("{}", line);
        }
        if let Some(log) = &self.log {
            if let Err(e) = log.prepend(&line) {
                error!(
                    "unable to write --log \"{}\": {}",
                    log.path().display(),
                    e
                );
            }
        }
        Some(line)
    }

    /// Format a code for display
    pub fn format_line(&self, at: &DateTime<Local>, code: &DecodedCode) -> String {
        let time = at.format(TIME_FORMAT);
        match self.dictionary.lookup(code.as_str()) {
            Some(desc) => format!("{} {} {}", time, code, desc),
            None => format!("{} {}", time, code),
        }
    }

    // Apply the validity filter and repeat lockout
    fn accept(&mut self, code: &DecodedCode) -> bool {
        if !code.has_unique_characters() {
            warn!(
                "[{:<14}]: discarding invalid code \"{}\": repeated character",
                code.end(),
                code
            );
            return false;
        }

        if let Some((last_code, last_end)) = &self.last {
            if last_code == code.as_str() && code.start().saturating_sub(*last_end) < self.lockout
            {
                info!(
                    "[{:<14}]: suppressing repeat of \"{}\"",
                    code.end(),
                    code
                );
                return false;
            }
        }

        self.last = Some((code.as_str().to_owned(), code.end()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use selcal::block_queue;

    fn reporter(lockout: u64) -> Reporter {
        let dict = Dictionary::parse("AMBC\tG-ABCD\tB744\tExample Air\n".as_bytes())
            .expect("dictionary");
        Reporter::new(dict, None, lockout, true)
    }

    #[test]
    fn test_format_line() {
        let rep = reporter(0);
        let at = Local
            .with_ymd_and_hms(2024, 5, 24, 14, 3, 52)
            .single()
            .expect("local time");

        assert_eq!(
            "24/05/24 14:03:52 AMBC (G-ABCD B744 Example Air)",
            rep.format_line(&at, &DecodedCode::new("AMBC", 0, 100))
        );
        assert_eq!(
            "24/05/24 14:03:52 DEFG",
            rep.format_line(&at, &DecodedCode::new("DEFG", 0, 100))
        );
    }

    #[test]
    fn test_lockout() {
        let mut rep = reporter(32000);

        assert!(rep
            .report_code(&DecodedCode::new("AMBC", 0, 16000))
            .is_some());

        // repeated within lockout
        assert!(rep
            .report_code(&DecodedCode::new("AMBC", 24000, 40000))
            .is_none());

        // lockout runs from the end of the printed code
        assert!(rep
            .report_code(&DecodedCode::new("AMBC", 50000, 66000))
            .is_some());

        // a different code always prints
        assert!(rep
            .report_code(&DecodedCode::new("DEFG", 90000, 106000))
            .is_some());

        // and resets the lockout
        assert!(rep
            .report_code(&DecodedCode::new("AMBC", 110000, 126000))
            .is_some());

        // repeat after the lockout expires
        assert!(rep
            .report_code(&DecodedCode::new("AMBC", 200000, 216000))
            .is_some());
    }

    #[test]
    fn test_validity_filter() {
        let mut rep = reporter(0);
        assert!(rep
            .report_code(&DecodedCode::new("AABC", 0, 100))
            .is_none());
        assert!(rep
            .report_code(&DecodedCode::new("ABAB", 200, 300))
            .is_none());
        assert!(rep
            .report_code(&DecodedCode::new("ABCD", 400, 500))
            .is_some());
    }

    #[test]
    fn test_log_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = CodeLog::new(dir.path().join("log.txt"));
        let mut rep = Reporter::new(Dictionary::default(), Some(log.clone()), 0, true);

        let first = rep
            .report_code(&DecodedCode::new("AMBC", 0, 100))
            .expect("printed");
        let second = rep
            .report_code(&DecodedCode::new("DEFG", 200, 300))
            .expect("printed");

        let contents = std::fs::read_to_string(log.path()).expect("read log");
        assert_eq!(format!("{}\n{}\n", second, first), contents);
    }

    #[test]
    fn test_capture() {
        let input: Vec<u8> = [0i16, 16384, -32768, 8192, -16384]
            .iter()
            .flat_map(|sa| sa.to_ne_bytes())
            .chain(std::iter::once(0x7fu8))
            .collect();

        let (tx, rx) = block_queue(8);
        let total = capture(input.as_slice(), &tx, 2, true).expect("capture");
        drop(tx);
        assert_eq!(5, total);

        let mut receiver = selcal::SelcalReceiverBuilder::new(8000).build(
            crate::table_file::load(None, selcal::Tolerance::default()).expect("table"),
        );
        let stats = selcal::run_pipeline(&mut receiver, &rx, |_evt| {});
        assert_eq!(3, stats.blocks);
        assert_eq!(5, stats.samples);
        assert_eq!(0, stats.discontinuities);
    }

    #[test]
    fn test_capture_error() {
        struct Broken;
        impl io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
            }
        }

        let (tx, rx) = block_queue(2);
        assert!(capture(Broken, &tx, 16, false).is_err());
        assert!(rx.is_shutdown());
    }
}
