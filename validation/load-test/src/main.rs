//! Load test CLI for the order web app and its REST data API.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use load_test::{LoadRunner, ResultsReport, RunSummary, TestConfig};

#[derive(Parser)]
#[command(name = "load-test")]
#[command(about = "Simulates concurrent users browsing the order web app", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,

        /// Number of concurrent users
        #[arg(short, long)]
        users: Option<u32>,

        /// Users started per second
        #[arg(long)]
        spawn_rate: Option<f64>,

        /// Test duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Behaviors each user runs before stopping
        #[arg(short, long)]
        iterations: Option<u64>,

        /// Minimum think time in seconds
        #[arg(long)]
        min_wait: Option<f64>,

        /// Maximum think time in seconds
        #[arg(long)]
        max_wait: Option<f64>,

        /// Seconds of traffic to discard before measuring
        #[arg(long)]
        warmup: Option<u64>,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Run a quick smoke test
    Quick {
        #[command(flatten)]
        target: TargetArgs,

        /// Number of users
        #[arg(short, long, default_value = "5")]
        users: u32,

        /// Behaviors per user
        #[arg(short, long, default_value = "10")]
        iterations: u64,
    },

    /// List the traffic mix and each behavior's share
    Behaviors,
}

/// Target endpoints and credentials, usually taken from the environment.
#[derive(Args)]
struct TargetArgs {
    /// Web app base URL
    #[arg(long, env = "APP_BASE_URL")]
    base_url: Option<String>,

    /// REST data API base URL (data API behaviors skip when unset)
    #[arg(long, env = "REST_API_URL")]
    rest_api_url: Option<String>,

    /// REST data API key
    #[arg(long, env = "REST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// User whose orders are listed
    #[arg(long, env = "TEST_USER_ID")]
    test_user_id: Option<String>,
}

/// Older deployments export the data API settings under these names.
const REST_API_URL_ALIASES: &[&str] = &["SUPABASE_REST_URL"];
const REST_API_KEY_ALIASES: &[&str] = &["SUPABASE_ANON_KEY"];

/// `value`, or the first alias set to a non-empty value.
fn or_alias(
    value: Option<String>,
    aliases: &[&str],
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    value.or_else(|| {
        aliases.iter().find_map(|&name| {
            let found = lookup(name).filter(|v| !v.trim().is_empty())?;
            debug!(variable = name, "Using alias environment variable");
            Some(found)
        })
    })
}

impl TargetArgs {
    /// Fill unset data API settings from the alias variables.
    fn with_aliases(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.rest_api_url = or_alias(self.rest_api_url, REST_API_URL_ALIASES, &lookup);
        self.api_key = or_alias(self.api_key, REST_API_KEY_ALIASES, &lookup);
        self
    }

    fn apply(self, config: &mut TestConfig) {
        let target = self.with_aliases(|name| std::env::var(name).ok());
        if let Some(url) = target.base_url {
            config.engine.base_url = Some(url);
        }
        if let Some(url) = target.rest_api_url {
            config.engine.rest_api_url = Some(url);
        }
        if let Some(key) = target.api_key {
            config.engine.api_key = Some(key);
        }
        if let Some(id) = target.test_user_id {
            config.scenario.test_user_id = Some(id);
        }
        if config.engine.is_degraded() {
            warn!(
                looked_up = "REST_API_URL, REST_API_KEY, SUPABASE_REST_URL, SUPABASE_ANON_KEY",
                "REST data API not configured"
            );
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            config,
            target,
            users,
            spawn_rate,
            duration,
            iterations,
            min_wait,
            max_wait,
            warmup,
            seed,
            output,
        } => {
            let mut config = match config {
                Some(path) => {
                    info!(path = %path.display(), "Loading scenario");
                    TestConfig::from_file(&path)?
                }
                None => TestConfig::default(),
            };

            // Apply overrides
            target.apply(&mut config);
            let engine = &mut config.engine;
            if let Some(u) = users {
                engine.users = u;
            }
            if let Some(r) = spawn_rate {
                engine.spawn_rate = r;
            }
            if let Some(d) = duration {
                engine.duration_secs = Some(d);
            }
            if let Some(i) = iterations {
                engine.iterations_per_user = Some(i);
            }
            if let Some(w) = min_wait {
                engine.min_wait = w;
            }
            if let Some(w) = max_wait {
                engine.max_wait = w;
            }
            if let Some(s) = seed {
                engine.seed = Some(s);
            }
            if let Some(w) = warmup {
                config.warmup_secs = w;
            }
            if config.engine.duration_secs.is_none() && config.engine.iterations_per_user.is_none() {
                warn!("No duration or iteration limit set; running until Ctrl-C");
            }

            config.validate()?;
            print_config(&config);

            let summary = run(config, true).await?;

            match output {
                OutputFormat::Json => println!("{}", ResultsReport::format_json(&summary)?),
                OutputFormat::Csv => {
                    println!("{}", ResultsReport::csv_header());
                    println!("{}", ResultsReport::format_csv(&summary));
                }
                OutputFormat::Table => println!("{}", ResultsReport::format_table(&summary)),
            }

            Ok(())
        }
        Commands::Quick {
            target,
            users,
            iterations,
        } => {
            let mut config = TestConfig {
                name: "quick".to_string(),
                description: "Quick smoke test".to_string(),
                ..TestConfig::default()
            };
            target.apply(&mut config);
            config.engine.users = users;
            config.engine.spawn_rate = f64::from(users.max(1));
            config.engine.iterations_per_user = Some(iterations);

            config.validate()?;
            print_config(&config);

            let summary = run(config, false).await?;
            println!("{}", ResultsReport::format_table(&summary));

            Ok(())
        }
        Commands::Behaviors => {
            let catalog = load_test::scenario::read_only_mix(&Default::default())?;
            println!("Traffic mix (total weight {}):", catalog.total_weight());
            println!();
            for behavior in catalog.iter() {
                let share = catalog.share(behavior.name()).unwrap_or_default() * 100.0;
                println!(
                    "  {:<24} weight {:>3}  ({:.1}%)",
                    behavior.name(),
                    behavior.weight(),
                    share
                );
            }
            Ok(())
        }
    }
}

/// Run with Ctrl-C wired to a graceful stop.
async fn run(config: TestConfig, show_progress: bool) -> anyhow::Result<RunSummary> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping users");
            on_signal.cancel();
        }
    });

    LoadRunner::new(config)
        .with_progress(show_progress)
        .run(cancel)
        .await
}

fn print_config(config: &TestConfig) {
    let engine = &config.engine;
    println!("✓ Configuration loaded successfully");
    println!("  Name: {}", config.name);
    if !config.description.is_empty() {
        println!("  Description: {}", config.description);
    }
    println!("  Target: {}", engine.base_url.as_deref().unwrap_or("-"));
    println!(
        "  Data API: {}",
        if engine.is_degraded() {
            "not configured (data behaviors skip)"
        } else {
            "configured"
        }
    );
    println!("  Users: {} (spawn rate {}/s)", engine.users, engine.spawn_rate);
    if let Some(d) = engine.duration_secs {
        println!("  Duration: {}s", d);
    }
    if let Some(i) = engine.iterations_per_user {
        println!("  Iterations per user: {}", i);
    }
    println!("  Think time: {}s - {}s", engine.min_wait, engine.max_wait);
    println!();
}

fn init_tracing(log_level: &str, json: bool) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn target() -> TargetArgs {
        TargetArgs {
            base_url: Some("http://localhost:5173".into()),
            rest_api_url: None,
            api_key: None,
            test_user_id: None,
        }
    }

    #[test]
    fn test_legacy_env_names_fill_data_api() {
        let env = HashMap::from([
            ("SUPABASE_REST_URL", "https://db.example.com/rest/v1"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]);
        let target = target().with_aliases(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(
            target.rest_api_url.as_deref(),
            Some("https://db.example.com/rest/v1")
        );
        assert_eq!(target.api_key.as_deref(), Some("anon"));
    }

    #[test]
    fn test_primary_names_win_over_aliases() {
        let env = HashMap::from([("SUPABASE_REST_URL", "https://old.example.com")]);
        let mut args = target();
        args.rest_api_url = Some("https://new.example.com".into());
        let target = args.with_aliases(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(target.rest_api_url.as_deref(), Some("https://new.example.com"));
        assert_eq!(target.api_key, None);
    }

    #[test]
    fn test_blank_alias_ignored() {
        let env = HashMap::from([("SUPABASE_ANON_KEY", " ")]);
        let target = target().with_aliases(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(target.api_key, None);
    }
}
