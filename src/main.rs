use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use squad_stats::batch::{default_concurrency, spawn_batch, BatchJob};
use squad_stats::calculate::compute_stats;
use squad_stats::config::AppConfig;
use squad_stats::format::{format_compact_number, format_duration_ms};
use squad_stats::models::{AggregateOptions, AggregateResult, DisruptionMethod, SkillDamageSource};
use squad_stats::storage::jsonl::JsonlWriter;
use squad_stats::storage::{load_records, write_json, StorageConfig};

#[derive(Parser)]
#[command(name = "squad-stats")]
#[command(about = "Cross-fight statistics for squad PvP combat logs")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate fight logs into a stats JSON file
    Aggregate {
        /// Fight records: a JSON/JSONL file, a directory or a glob. Repeat to
        /// aggregate several independent collections into one JSONL file.
        #[arg(long, required = true)]
        input: Vec<String>,

        /// Output file ("-" for stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Compute MVP placements
        #[arg(long)]
        show_mvp: Option<bool>,

        /// Skill damage source: target or total
        #[arg(long)]
        skill_source: Option<SkillDamageSource>,

        /// Disruption scoring: count, duration or tiered
        #[arg(long)]
        disruption: Option<DisruptionMethod>,
    },

    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print a short summary of a fight collection
    Inspect {
        #[arg(long)]
        input: String,
    },
}

#[derive(Serialize)]
struct BatchLine<'a> {
    input: &'a str,
    result: AggregateResult,
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::from_file(&path.to_path_buf())
            .with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}

fn print_summary(result: &AggregateResult, records: usize) {
    let stats = &result.stats;
    let combat_ms: f64 = result
        .skill_usage_data
        .log_records
        .iter()
        .map(|r| r.duration_seconds * 1000.0)
        .sum();
    println!("Records:        {}", records);
    println!("Valid fights:   {}", result.valid_fight_count);
    println!("Wins / losses:  {} / {}", stats.wins, stats.losses);
    println!("Combat time:    {}", format_duration_ms(combat_ms));
    println!("Players:        {}", stats.attendance.len());
    println!("Avg squad size: {:.1}", stats.avg_squad_size);
    if let Some(top) = stats.leaderboards.get("damage").and_then(|b| b.first()) {
        println!("Top damage:     {} ({})", top.account, format_compact_number(top.value));
    }
    if stats.mvp.score > 0.0 {
        println!("MVP:            {} ({}, {:.2})", stats.mvp.account, stats.mvp.reason, stats.mvp.score);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // Initialize tracing
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!("Starting squad-stats v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Aggregate {
            input,
            output,
            pretty,
            show_mvp,
            skill_source,
            disruption,
        } => {
            let mut options: AggregateOptions = config.aggregation.clone();
            if let Some(show) = show_mvp {
                options.view.show_mvp = show;
            }
            if let Some(source) = skill_source {
                options.view.skill_damage_source = source;
            }
            if let Some(method) = disruption {
                options.view.disruption_method = method;
            }
            let storage = StorageConfig::new(config.data_dir.clone());

            if let [single] = input.as_slice() {
                let records = load_records(single)?;
                let result = tokio::task::spawn_blocking(move || compute_stats(&records, &options))
                    .await
                    .context("Aggregation task failed")?;

                match output {
                    Some(path) if path.as_os_str() == "-" => {
                        let text = if pretty {
                            serde_json::to_string_pretty(&result)?
                        } else {
                            serde_json::to_string(&result)?
                        };
                        println!("{}", text);
                    }
                    other => {
                        let path = other.unwrap_or_else(|| storage.default_output_path(single));
                        write_json(&path, &result, pretty)?;
                        println!("Aggregated {} fights into {}", result.valid_fight_count, path.display());
                    }
                }
            } else {
                let mut jobs = Vec::with_capacity(input.len());
                for path in &input {
                    jobs.push(BatchJob {
                        records: load_records(path)?,
                        options: options.clone(),
                    });
                }
                let out = output.unwrap_or_else(|| storage.output_dir().join("batch.jsonl"));
                let mut rx = spawn_batch(jobs, default_concurrency());
                let mut writer = JsonlWriter::create(out.clone())?;
                while let Some((index, result)) = rx.recv().await {
                    tracing::info!(input = %input[index], fights = result.valid_fight_count, "Collection aggregated");
                    writer.write(&BatchLine {
                        input: &input[index],
                        result,
                    })?;
                }
                let written = writer.finish()?;
                println!("Aggregated {} of {} collections into {}", written, input.len(), out.display());
            }
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = squad_stats::api::state::AppState::new(
                config.aggregation.clone(),
                config.server.max_body_bytes,
            );
            let app = squad_stats::api::build_router(state, &config.server.cors_origin);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Inspect { input } => {
            let records = load_records(&input)?;
            let count = records.len();
            let options = config.aggregation.clone();
            let result = tokio::task::spawn_blocking(move || compute_stats(&records, &options))
                .await
                .context("Aggregation task failed")?;
            print_summary(&result, count);
        }
    }

    Ok(())
}
