//! textstream — detect text encodings and stream-decode files to UTF-8.
//!
//! - `textstream detect a.txt b.csv [--json]`
//! - `textstream decode legacy.txt -o utf8.txt`
//! - `cat legacy.txt | textstream decode --encoding gbk`

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;

use textstream_core::{
    detect_encoding_with, ByteSource, CandidateList, DecodeOptions, EncodingLabel, TextStream,
    Unseekable,
};

#[derive(Parser)]
#[command(
    name = "textstream",
    version,
    about = "Detect text encodings and decode byte streams to UTF-8"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Candidate encodings in order of preference, e.g. "utf-8,gbk"
    #[arg(long, global = true)]
    candidates: Option<String>,

    /// Bytes sampled for detection (default: 4096)
    #[arg(long, global = true)]
    sample_size: Option<usize>,

    /// Dump effective merged config as TOML and exit
    #[arg(long, global = true)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected encoding of each file
    Detect {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Emit a JSON array instead of text lines
        #[arg(long)]
        json: bool,
    },
    /// Decode a file (or stdin) to UTF-8
    Decode {
        /// Input file; stdin when omitted or "-"
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip detection and decode with this encoding
        #[arg(long)]
        encoding: Option<String>,

        /// Bytes per read
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

#[derive(Debug, Serialize)]
struct Detection {
    path: String,
    encoding: &'static str,
}

/// Load config from global and project-local TOML files.
/// The project-local file, when present, replaces the global one.
/// Missing files are silently ignored.
fn load_config() -> DecodeOptions {
    let mut opts = DecodeOptions::default();

    // 1. Global config: ~/.config/textstream/config.toml
    if let Some(config_dir) = dirs::config_dir() {
        if let Some(parsed) = read_config_file(&config_dir.join("textstream").join("config.toml")) {
            opts = parsed;
        }
    }

    // 2. Project-local config: ./.textstream.toml
    if let Some(parsed) = read_config_file(Path::new(".textstream.toml")) {
        opts = parsed;
    }

    opts
}

fn read_config_file(path: &Path) -> Option<DecodeOptions> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<DecodeOptions>(&contents) {
        Ok(parsed) => {
            log::debug!("Loaded config from {}", path.display());
            Some(parsed)
        }
        Err(e) => {
            log::warn!("Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

/// Apply CLI flags on top of config-loaded options.
fn apply_cli_overrides(opts: &mut DecodeOptions, cli: &Cli) -> Result<()> {
    if let Some(ref list) = cli.candidates {
        opts.candidates = parse_candidates(list)?;
    }

    if let Some(sample_size) = cli.sample_size {
        opts.sample_size = sample_size;
    }

    if let Some(Commands::Decode {
        chunk_size: Some(chunk_size),
        ..
    }) = &cli.command
    {
        opts.chunk_size = *chunk_size;
    }

    opts.validate()?;
    Ok(())
}

fn parse_candidates(list: &str) -> Result<CandidateList> {
    let labels = list.split(',').filter(|l| !l.trim().is_empty());
    CandidateList::from_labels(labels).with_context(|| format!("Invalid --candidates '{}'", list))
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut options = load_config();
    apply_cli_overrides(&mut options, cli)?;

    // Handle --dump-config
    if cli.dump_config {
        let s = toml::to_string_pretty(&options).context("Error serializing config")?;
        println!("{}", s);
        return Ok(());
    }

    match &cli.command {
        Some(Commands::Detect { files, json }) => run_detect(files, *json, &options),
        Some(Commands::Decode {
            input,
            output,
            encoding,
            ..
        }) => run_decode(input.as_deref(), output.as_deref(), encoding.as_deref(), &options),
        None => {
            eprintln!("Usage: textstream detect <FILES>...");
            eprintln!("   or: textstream decode [FILE] [-o OUTPUT] [--encoding LABEL]");
            process::exit(1);
        }
    }
}

fn run_detect(files: &[PathBuf], json: bool, options: &DecodeOptions) -> Result<()> {
    let detections = detect_files(files, options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &detections)?;
        writeln!(out)?;
    } else {
        for d in &detections {
            writeln!(out, "{}: {}", d.path, d.encoding)?;
        }
    }
    Ok(())
}

/// Detect every file in parallel; results keep the input order.
fn detect_files(files: &[PathBuf], options: &DecodeOptions) -> Result<Vec<Detection>> {
    files
        .par_iter()
        .map(|path| -> Result<Detection> {
            let mut file =
                File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
            let label = detect_encoding_with(&mut file, options);
            log::info!("{}: {}", path.display(), label);
            Ok(Detection {
                path: path.display().to_string(),
                encoding: label.name(),
            })
        })
        .collect()
}

fn run_decode(
    input: Option<&Path>,
    output: Option<&Path>,
    encoding: Option<&str>,
    options: &DecodeOptions,
) -> Result<()> {
    let encoding = encoding
        .map(EncodingLabel::for_label)
        .transpose()
        .context("Invalid --encoding")?;

    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let written = match input {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
            pump(file, encoding, options, &mut sink)
                .with_context(|| format!("Failed to decode {}", path.display()))?
        }
        _ => pump(Unseekable::new(io::stdin().lock()), encoding, options, &mut sink)
            .context("Failed to decode stdin")?,
    };
    sink.flush()?;

    log::info!("Wrote {} bytes of UTF-8", written);
    Ok(())
}

/// Stream `source` into `sink` as UTF-8, returning the bytes written.
fn pump<S: ByteSource>(
    source: S,
    encoding: Option<EncodingLabel>,
    options: &DecodeOptions,
    sink: &mut dyn Write,
) -> Result<usize> {
    let stream = match encoding {
        Some(label) => TextStream::with_encoding(source, label, options)?,
        None => TextStream::new(source, options)?,
    };
    log::info!("Decoding as {}", stream.encoding());

    let mut written = 0;
    for text in stream {
        let text = text?;
        sink.write_all(text.as_bytes())?;
        written += text.len();
    }
    Ok(written)
}
