//! mftexport CLI
//!
//! Command-line interface for the MFT metadata exporter.

use chrono::FixedOffset;
use clap::Parser;
use console::style;
use mftexport::{
    dump_resident_stream, export_file, logging, parse_timezone, ExportConfig, MftFile,
    OutputFormat, DEFAULT_TIME_FORMAT,
};
use std::path::PathBuf;

/// mftexport - NTFS MFT metadata exporter
///
/// Parses an extracted $MFT file and exports one record per name/stream
/// pair, with full paths resolved through the parent chain.
#[derive(Parser)]
#[command(name = "mftexport")]
#[command(author = "mftexport Contributors")]
#[command(version)]
#[command(about = "Parses a MFT file", long_about = None)]
struct Cli {
    /// The MFT file to be processed
    #[arg(short, long, value_name = "input file")]
    input: PathBuf,

    /// The filename and path where the resulting file will be saved
    #[arg(short, long, value_name = "output file")]
    output: PathBuf,

    /// Format of the output file
    #[arg(short, long, default_value = "csv", value_name = "format", value_parser = parse_format_arg)]
    format: OutputFormat,

    /// Use the FILE_NAME attribute for the dates. Valid only for bodyfile
    /// output.
    #[arg(long = "fn")]
    use_fn: bool,

    /// Dump a resident file from the MFT. Pass the entry number to dump;
    /// the content is written to the output path.
    #[arg(short = 'd', long = "dump", value_name = "entry number")]
    dump_entry: Option<u64>,

    /// Disable the application of the fixup array. Should be used only when
    /// trying to get MFT entries from memory.
    #[arg(long)]
    disable_fixup: bool,

    /// Convert all times to the provided timezone: 'UTC' or a fixed offset
    /// like '+02:00'
    #[arg(short, long, default_value = "UTC", value_name = "timezone", value_parser = parse_timezone_arg)]
    timezone: FixedOffset,

    /// strftime-style format for rendered timestamps
    #[arg(long, default_value = DEFAULT_TIME_FORMAT, value_name = "format string")]
    time_format: String,

    /// Number of parallel export workers
    #[arg(short, long, default_value = "1", value_name = "n")]
    workers: usize,
}

fn parse_format_arg(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

fn parse_timezone_arg(s: &str) -> Result<FixedOffset, String> {
    parse_timezone(s).map_err(|e| e.to_string())
}

fn main() {
    logging::init();

    let cli = Cli::parse();

    // The --fn switch only changes bodyfile output
    if cli.use_fn && cli.format != OutputFormat::Bodyfile {
        eprintln!(
            "{} Argument '--fn' can only be used with 'bodyfile' format.",
            style("Error:").red().bold()
        );
        std::process::exit(2);
    }

    if !cli.input.is_file() {
        eprintln!(
            "{} Path provided '{}' is not a file or does not exist.",
            style("Error:").red().bold(),
            cli.input.display()
        );
        std::process::exit(1);
    }

    if cli.output.exists() {
        logging::warn(
            "MAIN",
            &format!(
                "The output file '{}' exists and will be overwritten",
                cli.output.display()
            ),
        );
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> mftexport::Result<()> {
    let apply_fixup = !cli.disable_fixup;

    match cli.dump_entry {
        Some(entry_number) => {
            logging::info(
                "MAIN",
                &format!(
                    "Dumping entry '{}' to file '{}'",
                    entry_number,
                    cli.output.display()
                ),
            );
            let table = MftFile::open(&cli.input, apply_fixup)?;
            dump_resident_stream(&table, entry_number, &cli.output)?;
            println!(
                "{} Dumped entry {} to {}",
                style("✓").green().bold(),
                entry_number,
                cli.output.display()
            );
        }
        None => {
            let config = ExportConfig {
                format: cli.format,
                timezone: cli.timezone,
                time_format: cli.time_format,
                use_fn: cli.use_fn,
                workers: cli.workers,
                apply_fixup,
                show_progress: true,
            };

            let summary = export_file(&cli.input, &cli.output, &config)?;

            println!(
                "{} Exported {} records from {} entries to {}",
                style("✓").green().bold(),
                summary.records_written,
                summary.entries_scanned,
                cli.output.display()
            );
        }
    }

    Ok(())
}
