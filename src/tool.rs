// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for building and inspecting CHD tables

use chd_table::{coding::Encode, Builder, Config, Table, DEFAULT_MAX_ATTEMPTS};
use clap::{ArgAction, Parser, Subcommand};
use humansize::{format_size, BINARY};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("CHD_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));
}

/// CLI tool for building and inspecting CHD tables
#[derive(Parser, Debug)]
#[command(name = "chd")]
#[command(about = "CLI tool for building and inspecting CHD tables")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Build a table from a delimited text file
    Build {
        /// Input file, one record per line
        input: PathBuf,

        /// Output table file
        output: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,

        /// Column to use for the key
        #[arg(short, long, default_value_t = 0)]
        key_column: usize,

        /// Column to use for the value
        #[arg(short = 'c', long, default_value_t = 1)]
        value_column: usize,

        /// Skip checking the built table against the input
        #[arg(long)]
        skip_verify: bool,

        /// Fresh displacement seeds tried per bucket
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u64,

        /// Seed for the random source (for reproducible tables)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Get the value for a key
    Get {
        /// Table file
        table: PathBuf,

        /// The key to look up
        key: String,
    },
    /// Print all entries in slot order
    #[command(visible_alias = "ls")]
    Dump {
        /// Table file
        table: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },
    /// Check that every key hashes to its own slot
    Verify {
        /// Table file
        table: PathBuf,
    },
    /// Show table statistics
    Info {
        /// Table file
        table: PathBuf,
    },
}

fn read_file(path: &Path) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => die!("Error reading {}: {e}", path.display()),
    }
}

fn open_table(bytes: &[u8]) -> Table<'_> {
    match Table::from_slice(bytes) {
        Ok(table) => table,
        Err(e) => die!("Error opening table: {e}"),
    }
}

fn load_records(
    input: &Path,
    delimiter: char,
    key_column: usize,
    value_column: usize,
) -> io::Result<Vec<(String, String)>> {
    let reader = BufReader::new(File::open(input)?);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let fields = line.split(delimiter).collect::<Vec<_>>();

        let (Some(key), Some(value)) = (fields.get(key_column), fields.get(value_column)) else {
            die!(
                "Line {} has {} fields, expected columns {key_column} and {value_column}",
                line_no + 1,
                fields.len()
            );
        };

        records.push(((*key).to_string(), (*value).to_string()));
    }

    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn build(
    input: &Path,
    output: &Path,
    delimiter: char,
    key_column: usize,
    value_column: usize,
    skip_verify: bool,
    max_attempts: u64,
    seed: Option<u64>,
) {
    let start = Instant::now();

    let records = match load_records(input, delimiter, key_column, value_column) {
        Ok(records) => records,
        Err(e) => die!("Error reading {}: {e}", input.display()),
    };

    info!("Loaded {} records in {:?}", records.len(), start.elapsed());

    let mut config = Config::default().max_attempts(max_attempts);
    if let Some(seed) = seed {
        config = config.rng_seed(seed);
    }

    let mut builder = Builder::with_config(config);
    builder.extend(records.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let start = Instant::now();
    let table = match builder.build() {
        Ok(table) => table,
        Err(e) => die!("Error building table: {e}"),
    };

    info!(
        "Built table with {} entries and {} seeds in {:?}",
        table.len(),
        table.seed_count(),
        start.elapsed()
    );

    if !skip_verify {
        for (key, value) in &records {
            if table.get(key.as_bytes()) != Some(value.as_bytes()) {
                die!("Table did not validate: key {key:?} did not map to value {value:?}");
            }
        }

        info!("Validated {} keys", table.len());
    }

    let file = match File::create(output) {
        Ok(file) => file,
        Err(e) => die!("Error creating {}: {e}", output.display()),
    };

    let mut writer = BufWriter::new(file);

    if let Err(e) = table.encode_into(&mut writer) {
        die!("Error writing table: {e}");
    }
    if let Err(e) = writer.flush() {
        die!("Error writing table: {e}");
    }

    debug!("Wrote table to {}", output.display());
}

fn main() {
    let args = ToolArgs::parse();
    init_tracing(args.quiet, args.verbose);

    match args.command {
        ToolCommand::Build {
            input,
            output,
            delimiter,
            key_column,
            value_column,
            skip_verify,
            max_attempts,
            seed,
        } => build(
            &input,
            &output,
            delimiter,
            key_column,
            value_column,
            skip_verify,
            max_attempts,
            seed,
        ),
        ToolCommand::Get { table, key } => {
            let bytes = read_file(&table);
            let table = open_table(&bytes);

            match table.get(key.as_bytes()) {
                Some(value) => println!("{}", String::from_utf8_lossy(value)),
                None => die!("Key {key:?} not found"),
            }
        }
        ToolCommand::Dump { table, delimiter } => {
            let bytes = read_file(&table);
            let table = open_table(&bytes);

            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());

            for (key, value) in &table {
                let res = writeln!(
                    out,
                    "{}{delimiter}{}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value)
                );

                if res.is_err() {
                    // NOTE: Most likely a closed pipe
                    break;
                }
            }

            let _ = out.flush();
        }
        ToolCommand::Verify { table } => {
            let bytes = read_file(&table);
            let table = open_table(&bytes);

            match table.verify() {
                Ok(()) => println!("OK ({} entries)", table.len()),
                Err(e) => die!("Table is inconsistent: {e}"),
            }
        }
        ToolCommand::Info { table: path } => {
            let bytes = read_file(&path);
            let table = open_table(&bytes);

            let (key_bytes, value_bytes) = table
                .iter()
                .fold((0, 0), |(k, v), (key, value)| (k + key.len(), v + value.len()));

            println!("File:     {}", path.display());
            println!("Size:     {}", format_size(bytes.len(), BINARY));
            println!("Entries:  {}", table.len());
            println!("Buckets:  {}", table.bucket_count());
            println!("Seeds:    {}", table.seed_count());
            println!("Keys:     {}", format_size(key_bytes, BINARY));
            println!("Values:   {}", format_size(value_bytes, BINARY));
        }
    }
}
