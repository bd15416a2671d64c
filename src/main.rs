// Tue Jan 13 2026 - Alex

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rtti_scanner::{
    config::Config,
    memory::{AddressSpace, BinaryImage, ImageFormat},
    output::{JsonSerializer, ReportFormat, ReportGenerator, ResultStore, ResultTable},
    rtti::{ScanReport, ScanSession, ScanStatus, SegmentSelection, TargetInfo},
    utils::{self, logging},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Recovers MSVC RTTI classes and vftables from PE images", long_about = None)]
struct Args {
    binary: PathBuf,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    text_output: Option<PathBuf>,

    /// Type record fields individually instead of declaring whole structures.
    #[arg(long)]
    no_structs: bool,

    #[arg(long)]
    overwrite_comments: bool,

    /// Segment name or `START-END` address range; repeatable.
    #[arg(long = "segment")]
    segments: Vec<String>,

    /// Scan targets that are not MSVC x86/x64 PE images.
    #[arg(long)]
    force: bool,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    no_progress: bool,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_segment(value: &str) -> SegmentSelection {
    if let Some((start, end)) = value.split_once('-') {
        if let (Some(start), Some(end)) = (utils::parse_address(start), utils::parse_address(end)) {
            return SegmentSelection::Range { start, end };
        }
    }
    SegmentSelection::Named(value.to_string())
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    config = config.with_target_binary(args.binary.clone());
    if let Some(output) = &args.output {
        config = config.with_output_file(output.clone());
    }
    if let Some(text) = &args.text_output {
        config = config.with_text_output(text.clone());
    }
    if args.no_structs {
        config = config.with_place_structures(false);
    }
    if args.overwrite_comments {
        config = config.with_overwrite_comments(true);
    }
    for segment in &args.segments {
        config = config.with_segment(parse_segment(segment));
    }
    if args.force {
        config.force = true;
    }
    if args.no_progress {
        config.enable_progress_bars = false;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("{} {:#}", "[!]".red(), e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    logging::init_logger(&config.log_level);

    println!("{}", "RTTI Scanner".cyan().bold());
    println!("{}", "=".repeat(50).cyan());
    println!();

    let start_time = Instant::now();
    println!("{} Loading binary: {}", "[*]".blue(), args.binary.display());
    let mut image = BinaryImage::load(&args.binary)
        .with_context(|| format!("failed to load {}", args.binary.display()))?;
    println!(
        "{} Binary loaded: {} segments",
        "[+]".green(),
        image.database.segments().len()
    );

    let target = TargetInfo::detect(&image.info);
    println!("{} Target: {}", "[*]".blue(), target);
    if let Err(advisory) = target.check() {
        if !config.force {
            eprintln!("{} {}", "[!]".red(), advisory);
            eprintln!("{} Re-run with --force to scan anyway", "[!]".red());
            anyhow::bail!("unsupported target");
        }
        println!("{} {}, continuing at reduced accuracy", "[!]".yellow(), advisory);
    }
    if image.info.format != ImageFormat::Pe {
        println!("{} Non-PE images carry no MSVC RTTI; expect few results", "[!]".yellow());
    }
    println!("{} Addressing: {}", "[*]".blue(), target.mode());
    println!();

    let spinner = if config.enable_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let mut session = ScanSession::new(target.mode(), config.scan_config());
    if let Some(pb) = spinner.clone() {
        session = session.with_progress(move |progress| {
            pb.set_message(format!(
                "{} [{} @ {}] {} found",
                progress.pass, progress.segment, progress.address, progress.found
            ));
        });
    }

    println!("{} Starting RTTI scan...", "[*]".blue());
    let mut results = ResultTable::new();
    let report = session.run(&mut image.database, &mut results);

    if let Some(pb) = &spinner {
        match report.status {
            ScanStatus::Completed => pb.finish_with_message("Complete!"),
            ScanStatus::Aborted => pb.abandon_with_message("Aborted"),
        }
    }

    print_results_summary(&report, &results);

    JsonSerializer::new()
        .serialize_to_file(results.rows(), &report, Some(&target), &config.output_file)
        .with_context(|| format!("failed to save {}", config.output_file.display()))?;
    println!("{} Results saved to: {}", "[+]".green(), config.output_file.display());

    if let Some(text_path) = &config.text_output {
        let generator = ReportGenerator::new(ReportFormat::Text);
        match generator.generate_to_file(results.rows(), &report, Some(&target), text_path) {
            Ok(()) => println!("{} Text report saved to: {}", "[+]".green(), text_path.display()),
            Err(e) => eprintln!("{} Failed to save text report: {}", "[!]".red(), e),
        }
    }

    println!();
    println!("{}", "=".repeat(50).cyan());
    println!(
        "{} RTTI scan complete in {}",
        "[+]".green(),
        utils::format_duration(start_time.elapsed())
    );
    Ok(())
}

fn print_results_summary(report: &ScanReport, results: &ResultTable) {
    println!();
    println!("{}", "Results Summary".cyan().bold());
    println!("{}", "-".repeat(40).cyan());

    println!("  Vftables: {}", results.count().to_string().green());
    println!("  Locators found: {}", report.cols_found.len().to_string().green());
    println!("  Locators matched: {}", report.matched_cols.to_string().green());
    println!(
        "  Orphaned locators: {}",
        if report.orphaned_cols.is_empty() {
            "0".green()
        } else {
            report.orphaned_cols.len().to_string().yellow()
        }
    );
    println!(
        "  Fixed: {}, {}",
        utils::pluralize(report.vftables_fixed, "vftable", "vftables"),
        utils::pluralize(report.code_locations_fixed, "code location", "code locations")
    );
    if report.unresolved > 0 {
        println!("  Unresolved offsets: {}", report.unresolved.to_string().yellow());
    }
    if report.is_aborted() {
        println!("  {}", "Scan was cancelled; results are partial".red());
    }
    println!("  Scan time: {}", utils::format_duration(report.elapsed));
    println!();
}
