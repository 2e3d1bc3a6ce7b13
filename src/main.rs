use anyhow::Context;
use clap::{Parser, Subcommand};
use pianoscribe_lib::config::{load_config, validate_config, Config};
use pianoscribe_lib::export::export_midi;
use pianoscribe_lib::pipeline::{analyze_events_with_observer, SourceInfo, TraceWriter};
use pianoscribe_lib::{RawNoteEvent, VelocityCurve};
use std::fs;
use std::path::PathBuf;

/// Piano note refinement for pitch-detection model output
#[derive(Parser)]
#[command(name = "pianoscribe")]
#[command(about = "Clean raw pitch-detection events into a playable piano note sequence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refine a JSON array of raw model events into notes.json
    Refine {
        /// Raw events file (JSON array of {start_time, end_time, pitch, velocity})
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Source identifier recorded in the document (defaults to the input file name)
        #[arg(long)]
        source: Option<String>,

        /// Title recorded in the document
        #[arg(long)]
        title: Option<String>,

        /// Velocity curve: piano, soft, hard or linear
        #[arg(long)]
        curve: Option<VelocityCurve>,

        /// Merge gap in seconds
        #[arg(long)]
        min_gap: Option<f64>,

        /// Maximum note duration in seconds
        #[arg(long)]
        max_duration: Option<f64>,

        /// Skip the adaptive density filter
        #[arg(long)]
        no_density: bool,

        /// Skip the harmonic filter
        #[arg(long)]
        no_harmonic: bool,

        /// Keep detected velocities as they are
        #[arg(long)]
        no_velocity_curve: bool,

        /// Also write notes.mid
        #[arg(long)]
        midi: bool,

        /// Also append progress to trace.jsonl
        #[arg(long)]
        trace: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Refine {
            input,
            output,
            config,
            source,
            title,
            curve,
            min_gap,
            max_duration,
            no_density,
            no_harmonic,
            no_velocity_curve,
            midi,
            trace,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            let mut config = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => Config::default(),
            };

            let refinement = &mut config.refinement;
            if let Some(curve) = curve {
                refinement.velocity.curve = curve;
            }
            if let Some(min_gap) = min_gap {
                refinement.merge.min_gap = min_gap;
            }
            if let Some(max_duration) = max_duration {
                refinement.merge.max_duration = max_duration;
            }
            refinement.density.enabled &= !no_density;
            refinement.harmonic.enabled &= !no_harmonic;
            refinement.velocity.enabled &= !no_velocity_curve;
            validate_config(&config)?;

            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let raw: Vec<RawNoteEvent> = serde_json::from_slice(&bytes)
                .with_context(|| format!("{} is not a JSON array of raw events", input.display()))?;

            let source_name = source.unwrap_or_else(|| {
                input
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| input.display().to_string())
            });
            let mut source = SourceInfo::named(source_name).with_digest(&bytes);
            source.title = title;

            if !quiet {
                println!("Refining {} raw events from {}...", raw.len(), input.display());
            }

            fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;

            let trace_writer = trace.then(|| TraceWriter::new(output.join("trace.jsonl")));
            let mut trace_error = None;
            let result = analyze_events_with_observer(&raw, source, &config, |entry| {
                log::debug!(
                    "[{}] {:.0}% {}",
                    entry.stage,
                    entry.progress * 100.0,
                    entry.message
                );
                if let Some(writer) = &trace_writer {
                    if let Err(e) = writer.write(entry) {
                        trace_error.get_or_insert(e);
                    }
                }
            });
            if let Some(e) = trace_error {
                return Err(e).context("Failed to write trace.jsonl");
            }

            let document_path = output.join("notes.json");
            result.document.write(&document_path)?;

            if midi {
                let bytes = export_midi(&result.notes, &config.midi)?;
                fs::write(output.join("notes.mid"), bytes)?;
            }

            if !quiet {
                let stats = &result.document.metadata.statistics;
                println!(
                    "{} notes ({} raw, {:.1}% filtered), total duration {:.2}s",
                    stats.final_count,
                    stats.original_count,
                    stats.filter_rate_percent,
                    result.document.metadata.total_duration
                );
                println!("Results saved to {}", output.display());
            }
        }
        Commands::ValidateConfig { config } => {
            let config = load_config(config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            let config = Config::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
