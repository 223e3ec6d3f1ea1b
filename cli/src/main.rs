//! labelslice CLI - split label sheets into one PDF per label

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use labelslice::{
    print_all, CommandPrinter, FileSelector, Preselected, PrintReport, PrinterSelector,
    SliceEvent, SliceOptions, SlicePipeline, SliceReport, SourceDocument, DEFAULT_BAND_HEIGHT,
};

/// Directory created next to the input when no output directory is given.
const DEFAULT_OUTPUT_DIR: &str = "Filtered_TextBeforeNewline_Labels";

#[derive(Parser)]
#[command(name = "labelslice")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Split label sheets into one PDF per label", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Send every kept label to this printer
    #[arg(long, value_name = "PRINTER", env = "LABELSLICE_PRINTER")]
    print: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a label sheet, keeping one slice per new label
    Split {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Height of one label band in points
        #[arg(long, value_name = "POINTS", env = "LABELSLICE_BAND_HEIGHT", default_value_t = DEFAULT_BAND_HEIGHT)]
        band_height: f64,

        /// Abort on the first band that cannot be extracted
        #[arg(long)]
        strict: bool,

        /// Stage every slice as a temporary file in the output directory
        #[arg(long)]
        temp_files: bool,

        /// Search all text in a band's content stream, including text outside the band
        #[arg(long)]
        whole_page_text: bool,

        /// Disable parallel band preparation
        #[arg(long)]
        sequential: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Send every kept label to this printer
        #[arg(long, value_name = "PRINTER", env = "LABELSLICE_PRINTER")]
        print: Option<String>,
    },

    /// Send PDF files to a printer
    Print {
        /// Files to print
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Printer name
        #[arg(short, long, value_name = "NAME", env = "LABELSLICE_PRINTER")]
        printer: Option<String>,

        /// Print command; {printer} and {file} are substituted
        #[arg(long, value_name = "TEMPLATE")]
        command: Option<String>,

        /// Seconds to wait for each print command
        #[arg(long, value_name = "SECS", default_value = "10")]
        timeout: u64,
    },

    /// Show pages, bands and the label codes visible in each band
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Height of one label band in points
        #[arg(long, value_name = "POINTS", env = "LABELSLICE_BAND_HEIGHT", default_value_t = DEFAULT_BAND_HEIGHT)]
        band_height: f64,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Split {
            input,
            output,
            band_height,
            strict,
            temp_files,
            whole_page_text,
            sequential,
            json,
            print,
        }) => {
            let mut options = SliceOptions::new()
                .with_band_height(band_height)
                .with_parallel(!sequential);
            if strict {
                options = options.strict();
            }
            if temp_files {
                options = options.temp_files();
            }
            if whole_page_text {
                options = options.with_scope(labelslice::ExtractionScope::ContentStream);
            }
            cmd_split(Preselected::new(Some(input)), output.as_deref(), options, json, print)
        }
        Some(Commands::Print {
            files,
            printer,
            command,
            timeout,
        }) => cmd_print(&files, printer, command, timeout),
        Some(Commands::Info { input, band_height }) => cmd_info(&input, band_height),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: split with default options if input is provided
            if cli.input.is_some() {
                cmd_split(
                    Preselected::new(cli.input),
                    cli.output.as_deref(),
                    SliceOptions::default(),
                    false,
                    cli.print,
                )
            } else {
                println!("{}", "Usage: labelslice <FILE> [OUTPUT]".yellow());
                println!("       labelslice --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_split(
    mut files: impl FileSelector,
    output: Option<&Path>,
    options: SliceOptions,
    json: bool,
    printer: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(input) = files.select_input_file() else {
        println!("{}", "No file selected. Exiting...".yellow());
        return Ok(());
    };

    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| default_output_dir(&input));

    log::debug!("Splitting {} into {}", input.display(), output_dir.display());
    log::debug!("Options: {:?}", options);
    let pipeline = SlicePipeline::new(options)?;

    let pb = if json {
        ProgressBar::hidden()
    } else {
        println!("{}", "=== Split PDF and keep one slice per label ===".cyan().bold());
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    };

    let report = pipeline.run_with_observer(&input, &output_dir, |event| match event {
        SliceEvent::Started { candidates, .. } => {
            pb.set_length(*candidates as u64);
            pb.set_message("Scanning bands...");
        }
        SliceEvent::Accepted(record) => {
            pb.println(format!(
                "  {} {} ({})",
                "Saved".green(),
                file_name(&record.path),
                record.label
            ));
            pb.inc(1);
        }
        SliceEvent::Rejected { .. } => pb.inc(1),
        SliceEvent::Failed { band, reason } => {
            pb.println(format!("  {} slice {}: {}", "Skipped".yellow(), band.index, reason));
            pb.inc(1);
        }
        SliceEvent::Finished(_) => pb.finish_with_message("Done!"),
    })?;

    if json {
        println!("{}", report.to_json(true)?);
    } else {
        print_summary(&report, &output_dir);
    }

    if report.records.is_empty() {
        if !json {
            println!("{}", "No labels with matching text found to print.".yellow());
        }
        return Ok(());
    }

    if let Some(printer) = printer {
        let print_report = dispatch(&report.paths(), Preselected::new(Some(printer)), CommandPrinter::new())?;
        if let Some(print_report) = print_report {
            if json {
                println!("{}", serde_json::to_string_pretty(&print_report)?);
            } else {
                print_print_report(&print_report);
            }
        }
    }

    Ok(())
}

fn cmd_print(
    files: &[PathBuf],
    printer: Option<String>,
    command: Option<String>,
    timeout: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatcher = CommandPrinter::new().with_timeout(Duration::from_secs(timeout));
    if let Some(template) = command {
        dispatcher = dispatcher.with_command(template);
    }

    if let Some(report) = dispatch(files, Preselected::new(printer), dispatcher)? {
        print_print_report(&report);
        if !report.is_success() {
            return Err(format!("{} of {} file(s) failed to print", report.outcomes.len() - report.succeeded(), report.outcomes.len()).into());
        }
    }

    Ok(())
}

/// Ask for a printer and send every file to it. `None` when no printer was chosen.
fn dispatch(
    files: &[PathBuf],
    mut printers: impl PrinterSelector,
    dispatcher: CommandPrinter,
) -> Result<Option<PrintReport>, Box<dyn std::error::Error>> {
    let Some(printer) = printers.select_printer() else {
        println!("{}", "No printer selected. Exiting...".yellow());
        return Ok(None);
    };
    log::debug!("Sending {} file(s) to {} via {:?}", files.len(), printer, dispatcher.template());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Printing to {}...", printer));

    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let report = print_all(&dispatcher, std::slice::from_ref(file), &printer);
        outcomes.extend(report.outcomes);
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(Some(PrintReport { printer, outcomes }))
}

fn cmd_info(input: &Path, band_height: f64) -> Result<(), Box<dyn std::error::Error>> {
    let source = SourceDocument::open(input)?;
    let pipeline = SlicePipeline::new(SliceOptions::new().with_band_height(band_height))?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), source.version());
    println!("{}: {}", "Pages".bold(), source.page_count());
    println!("{}: {} pt", "Band height".bold(), band_height);

    for page in source.pages() {
        println!(
            "  {} page {}: {:.1} x {:.1} pt",
            "├─".dimmed(),
            page.number,
            page.width,
            page.height
        );
    }

    println!();
    println!("{}", "Bands".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let survey = pipeline.inspect(&source);
    let mut labelled = 0;
    for (band, codes) in &survey {
        let detail = match codes {
            Ok(codes) if codes.is_empty() => "no label".dimmed().to_string(),
            Ok(codes) => {
                labelled += 1;
                codes
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
                    .green()
                    .to_string()
            }
            Err(e) => format!("{}", e).red().to_string(),
        };
        println!(
            "{:>4}  page {:<3} y {:>7.1}..{:<7.1} {}",
            band.index,
            band.page,
            band.rect.y,
            band.rect.top(),
            detail
        );
    }

    println!();
    println!("{}: {}", "Candidate slices".bold(), survey.len());
    println!("{}: {}", "Slices with codes".bold(), labelled);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "labelslice".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Label sheet splitting tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/labelslice".dimmed());
    println!("License: MIT");
}

fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_OUTPUT_DIR)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_summary(report: &SliceReport, output_dir: &Path) {
    let stats = &report.stats;
    println!();
    println!(
        "{} {} of {} slice(s) kept in {}",
        "Done!".green().bold(),
        stats.accepted,
        stats.candidates,
        output_dir.display()
    );
    println!(
        "  {} {} duplicate, {} blank, {} unreadable, {} failed",
        "└─".dimmed(),
        stats.duplicates,
        stats.blank,
        stats.unreadable,
        stats.failed
    );
}

fn print_print_report(report: &PrintReport) {
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!(
                "  {} {} -> {}",
                "Printed".green(),
                file_name(&outcome.path),
                report.printer
            ),
            Some(reason) => println!(
                "  {} {}: {}",
                "Failed".red(),
                file_name(&outcome.path),
                reason
            ),
        }
    }
    println!(
        "{} {}/{} file(s) sent to {}",
        "Done!".green().bold(),
        report.succeeded(),
        report.outcomes.len(),
        report.printer
    );
}
