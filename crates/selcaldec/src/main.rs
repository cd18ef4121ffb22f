use std::io;
use std::thread;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{info, LevelFilter};

use selcal::{block_queue, run_pipeline, SelcalReceiverBuilder, Tolerance};

mod app;
mod cli;
mod dictionary;
mod logfile;
mod table_file;

use cli::{Args, CliError};
use dictionary::Dictionary;
use logfile::CodeLog;

fn main() {
    match selcaldec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn selcaldec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // reference table: fatal if invalid
    let table = table_file::load(
        args.table.as_deref(),
        Tolerance::Fraction(args.tolerance / 100.0),
    )?;

    // create the decoder
    let mut builder = SelcalReceiverBuilder::new(args.rate);
    if let Some(window) = args.window {
        builder.with_window_size(window);
    }
    builder.with_hop(args.hop.unwrap_or(builder.window_size() / 4));
    if let Some(frames) = args.max_dropout {
        builder.with_max_dropout_frames(frames);
    }
    let mut rx = builder
        .with_band(args.band_low, args.band_high)
        .with_noise_multiplier(args.noise_multiplier)
        .with_relative_floor(args.relative_floor)
        .with_min_magnitude(args.min_magnitude)
        .with_max_imbalance(args.max_imbalance)
        .with_min_sustain(args.min_sustain)
        .with_max_gap(args.max_gap)
        .build(table);

    // outputs
    let dictionary = match &args.dictionary {
        Some(path) => Dictionary::load(path)?,
        None => Dictionary::default(),
    };
    let log = args.log.as_ref().map(CodeLog::new);
    let lockout = (args.lockout.max(0.0) * args.rate as f32).round() as u64;
    let mut reporter = app::Reporter::new(dictionary, log, lockout, args.quiet);

    // capture thread
    let input = file_setup(&args)?;
    let lossless = !args.input_is_stdin();
    let block_size = args.block_size as usize;
    let (tx, blocks) = block_queue(args.queue_depth as usize);
    let shutdown = blocks.shutdown_handle();
    let capture = thread::Builder::new()
        .name("capture".to_owned())
        .spawn(move || app::capture(input, &tx, block_size, lossless))
        .context("Unable to start capture thread")?;

    // processing: until the input is exhausted
    let stats = run_pipeline(&mut rx, &blocks, |evt| reporter.report(&evt));
    info!(
        "processed {} samples in {} blocks ({} dropped)",
        stats.samples, stats.blocks, stats.dropped
    );

    let captured = capture
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?;
    captured?;

    // flush all tones out of the decoder
    if !shutdown.is_shutdown() {
        if let Some(code) = rx.flush() {
            reporter.report_code(&code);
        }
    }

    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("selcal", log_filter)
            .filter_module("selcaldec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup(args: &Args) -> Result<Box<dyn io::BufRead + Send>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("SELCAL decoder reading standard input");
        if !is_terminal(&io::stdin()) {
            Ok(Box::new(io::BufReader::new(io::stdin())))
        } else {
            Err(anyhow!(
                "cowardly refusing to read audio samples from a terminal.

Pipe a source of raw uncompressed audio from sox, parec, rtl_fm,
or similar into this program."
            ))
        }
    } else {
        info!("SELCAL decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
