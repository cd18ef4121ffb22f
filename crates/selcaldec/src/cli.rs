use std::path::PathBuf;

use clap::{value_parser, Parser};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts raw PCM samples in signed 16-bit (i16) format, at the given sampling --rate, and decodes any SELCAL calls that are present. Each call is printed with the local time and the four-character code.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts raw PCM samples in signed 16-bit (i16) format, at the given sampling --rate, and decodes any SELCAL calls that are present. Each call is printed with the local time and the four-character code:

    24/05/24 14:03:52 AMBC (G-ABCD B744 Example Air)

You can pipe in audio from a receiver with parec

    parec --channels 1 --format s16ne --rate 8000 \
        | selcaldec -r 8000 --log selcal_log.txt

or an audio file with sox

    sox input.wav -t raw -r 8k -e signed -b 16 -c 1 - \
        | selcaldec -r 8000

The reference --table is a JSON file which names each tone and the two tones of each character:

    { "tones": { "A": 312.6, "F": 524.8, ... },
      "characters": { "A": ["A", "F"], ... } }

Without a --table, the sixteen ICAO tones are used, and character k is made from tones k and k+5.

The --dictionary is a tab-separated file with one assignment per line:

    CODE<TAB>registration<TAB>aircraft type<TAB>operator

Codes that repeat a character are never assigned and are discarded. A code that repeats the previous one within the --lockout time is printed only once.
"#;

const ADVANCED: &str = "Advanced Decoder Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even SELCAL codes
    #[arg(short, long)]
    pub quiet: bool,

    /// Sampling rate (Hz)
    ///
    /// Set to the sampling rate of your audio source. SELCAL tones
    /// are below 1.5 kHz, so 8000 Hz is plenty.
    #[arg(short, long, default_value_t = 8000)]
    #[arg(value_parser = value_parser!(u32).range(4000..))]
    pub rate: u32,

    /// Input file (or "-" for stdin)
    ///
    /// The input must be one-channel (mono), signed 16-bit
    /// native-endian at --rate.
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// Reference tone table (JSON)
    ///
    /// If omitted, the built-in table of ICAO tones is used.
    #[arg(short, long)]
    pub table: Option<PathBuf>,

    /// Log file for decoded codes
    ///
    /// Each decoded code is inserted at the top of this file.
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Assignee dictionary (tab-separated)
    #[arg(short, long)]
    pub dictionary: Option<PathBuf>,

    /// Suppress repeats of the same code for this long (s)
    #[arg(long, default_value_t = 4.0)]
    pub lockout: f32,

    /// Audio blocks to buffer before dropping the oldest
    #[arg(long, default_value_t = 16)]
    #[arg(value_parser = value_parser!(u32).range(1..))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub queue_depth: u32,

    /// Audio block size (samples)
    #[arg(long, default_value_t = 1024)]
    #[arg(value_parser = value_parser!(u32).range(1..))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub block_size: u32,

    /// Analysis window size (samples; default ~128 ms)
    #[arg(long)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub window: Option<usize>,

    /// Hop between analysis windows (samples; default ¼ window)
    #[arg(long)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub hop: Option<usize>,

    /// Lowest frequency analyzed (Hz)
    #[arg(long, default_value_t = 300.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub band_low: f32,

    /// Highest frequency analyzed (Hz)
    #[arg(long, default_value_t = 3500.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub band_high: f32,

    /// Peaks must exceed the median bin magnitude by this factor
    #[arg(long, default_value_t = 8.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub noise_multiplier: f32,

    /// Peaks must reach this fraction of the strongest peak
    #[arg(long, default_value_t = 0.1)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub relative_floor: f32,

    /// Minimum peak magnitude (full scale = 0.5)
    #[arg(long, default_value_t = 1.0e-3)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub min_magnitude: f32,

    /// Tone frequency tolerance (± percent)
    #[arg(long, default_value_t = 1.5)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub tolerance: f32,

    /// Maximum magnitude ratio between the two tones of a pair
    #[arg(long, default_value_t = 4.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub max_imbalance: f32,

    /// Minimum tone duration (s)
    #[arg(long, default_value_t = 0.25)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub min_sustain: f32,

    /// Misfire frames bridged within a held tone (default: window/hop + 1)
    #[arg(long)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub max_dropout: Option<u32>,

    /// Maximum gap between the tones of one code (s)
    #[arg(long, default_value_t = 2.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub max_gap: f32,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

/// An error which ends the program
#[derive(Debug)]
pub enum CliError {
    /// Bad arguments, or a request for `--help` or `--version`
    Usage(clap::Error),

    /// Anything else, with its chain of context
    Fatal(anyhow::Error),
}

impl CliError {
    /// Process exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(err) => err.exit_code(),
            CliError::Fatal(_) => 1,
        }
    }

    /// Report to the terminal and exit
    ///
    /// Usage errors are formatted by clap. Other errors print
    /// their whole context chain on one line.
    pub fn exit(self) -> ! {
        match self {
            CliError::Usage(err) => err.exit(),
            CliError::Fatal(err) => {
                eprintln!("selcaldec: error: {:#}", err);
                std::process::exit(1)
            }
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::Fatal(err)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        CliError::Usage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Context;
    use clap::CommandFactory;

    #[test]
    fn test_clap() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["selcaldec"]).expect("defaults");
        assert_eq!(8000, args.rate);
        assert!(args.input_is_stdin());
        assert_eq!(None, args.table);
        assert_eq!(4.0, args.lockout);
        assert_eq!(None, args.window);

        let args = Args::try_parse_from([
            "selcaldec",
            "-r",
            "48000",
            "--file",
            "in.raw",
            "--log",
            "out.txt",
            "--max-gap",
            "3.0",
        ])
        .expect("options");
        assert_eq!(48000, args.rate);
        assert!(!args.input_is_stdin());
        assert_eq!(Some(PathBuf::from("out.txt")), args.log);
        assert_eq!(3.0, args.max_gap);

        assert!(Args::try_parse_from(["selcaldec", "-r", "100"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let usage: CliError = Args::try_parse_from(["selcaldec", "--no-such-option"])
            .expect_err("bad option")
            .into();
        assert!(matches!(usage, CliError::Usage(_)));
        assert_ne!(0, usage.exit_code());

        let help: CliError = Args::try_parse_from(["selcaldec", "--help"])
            .expect_err("help is reported as an error")
            .into();
        assert_eq!(0, help.exit_code());

        let fatal: CliError = std::fs::read("/nonexistent/table.json")
            .context("Unable to read --table")
            .expect_err("missing file")
            .into();
        assert_eq!(1, fatal.exit_code());
    }
}
