//! Tasklens CLI
//!
//! Command-line interface for the Tasklens query engine:
//! - Run queries (`tasklens q tasks @webapp p1 due:eow`)
//! - Show query history
//! - List and remove saved queries
//! - Print the default configuration

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tasklens::config::{generate_default_config, Config, LoggingConfig};
use tasklens::query::{QueryEngine, QueryError, QueryOutput, ResultRow};
use tasklens::{RecordSource, SavedQueryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tasklens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query tasks, projects and time logs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory containing tasks.json, projects.json and timelogs.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query
    Q {
        /// Query words, e.g. tasks @webapp p<=2 due:eow cols:id,text
        words: Vec<String>,
        /// Evaluate as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        today: Option<String>,
        /// Show previously run queries instead
        #[arg(long)]
        history: bool,
    },

    /// List saved queries
    Saved {
        /// Delete a saved query by name
        #[arg(long)]
        remove: Option<String>,
    },

    /// Print or write the default configuration
    Config {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tasklens={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, loaded) = match Config::load_first(&Config::default_paths()) {
        Ok((config, path)) => (config, Ok(path)),
        Err(e) => (Config::from_env(), Err(e)),
    };
    if let Some(dir) = &cli.data_dir {
        config.data.dir = dir.to_string_lossy().to_string();
    }
    init_logging(&config.logging);

    match loaded {
        Ok(Some(path)) => tracing::info!("Loaded config from {:?}", path),
        Ok(None) => tracing::debug!("Using default config with environment overrides"),
        Err(e) => tracing::warn!("{}; using defaults", e),
    }

    match cli.command {
        Commands::Q {
            words,
            today,
            history,
        } => {
            let store = open_store(&config)?;

            if history {
                for (i, text) in store.history()?.iter().enumerate() {
                    println!("{:>4}  {}", i + 1, text);
                }
                return Ok(());
            }

            if words.is_empty() {
                anyhow::bail!("No query given. Example: tasklens q tasks @webapp p1");
            }

            let today = match today {
                Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .with_context(|| format!("Invalid --today date: {}", s))?,
                None => chrono::Local::now().date_naive(),
            };

            let data_dir = config.data_dir();
            let source = RecordSource::load_dir(&data_dir)
                .with_context(|| format!("Failed to load records from {:?}", data_dir))?;
            tracing::debug!("Loaded {} records from {:?}", source.len(), data_dir);

            let engine = QueryEngine::new(store).past_month_day(config.query.past_month_day);
            let text = words.join(" ");

            match engine.run(&text, &source, today) {
                Ok(output) => match cli.format.as_str() {
                    "json" => println!("{}", serde_json::to_string_pretty(&output)?),
                    "csv" => print_csv(&output)?,
                    _ => print_table(&output),
                },
                Err(e) => {
                    report_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Saved { remove } => {
            let store = open_store(&config)?;

            if let Some(name) = remove {
                if store.remove(&name)? {
                    println!("Removed saved query '{}'", name);
                } else {
                    eprintln!("No saved query named '{}'", name);
                    std::process::exit(1);
                }
                return Ok(());
            }

            let saved = store.list()?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&saved)?);
            } else if saved.is_empty() {
                println!("No saved queries yet.");
                println!();
                println!("Save one with:");
                println!("  tasklens q tasks due:eow save:week");
            } else {
                println!("{:<20} {}", "Name", "Query");
                println!("{}", "-".repeat(60));
                for query in saved {
                    println!("{:<20} {}", query.name, query.raw_text);
                }
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<SavedQueryStore>> {
    let path = config.store_path();
    let store = SavedQueryStore::open(&path)
        .with_context(|| format!("Failed to open saved queries at {:?}", path))?
        .history_limit(config.store.history_limit);
    Ok(Arc::new(store))
}

fn report_error(err: &QueryError) {
    eprintln!("error[{}]: {}", err.kind(), err);
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        eprintln!("  valid options: {}", suggestions.join(", "));
    }
}

fn cell_strings(row: &ResultRow<'_>) -> Vec<String> {
    row.cells.iter().map(|v| v.to_string()).collect()
}

fn print_rows(columns: &[String], rows: &[ResultRow<'_>]) {
    let cells: Vec<Vec<String>> = rows.iter().map(cell_strings).collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
                .min(40)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    println!("{}", header.join(" | "));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1)));

    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| {
                let v: String = v.chars().take(*w).collect();
                format!("{:<w$}", v, w = *w)
            })
            .collect();
        println!("{}", line.join(" | "));
    }
}

fn print_table(output: &QueryOutput<'_>) {
    if output.is_empty() {
        println!("No matching {}", output.domain);
        return;
    }

    match &output.groups {
        Some(groups) => {
            for group in groups {
                println!("== {} ({}) ==", group.key, group.rows.len());
                print_rows(&output.columns, &group.rows);
                println!();
            }
        }
        None => print_rows(&output.columns, &output.rows),
    }
}

fn print_csv(output: &QueryOutput<'_>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(&output.columns)?;
    for row in &output.rows {
        writer.write_record(cell_strings(row))?;
    }
    writer.flush()?;
    Ok(())
}
