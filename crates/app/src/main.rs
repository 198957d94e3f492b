use academy_core::model::{CheckpointId, Curriculum};
use academy_core::policy::DEFAULT_COOLDOWN_SECS;
use services::catalog::{bundled_curriculum, load_curriculum_file};
use services::{AppServices, CheckpointStanding, Clock};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod take;

use config::{Config, ConfigError, prepare_sqlite_file};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  academy checkpoints [--curriculum <path>]");
    eprintln!("  academy status [--learner <uuid>] [--db <sqlite_url>] [--curriculum <path>]");
    eprintln!("  academy take <checkpoint-id> [--learner <uuid>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --cooldown-secs <n>   wait after a failed attempt (default {DEFAULT_COOLDOWN_SECS})");
    eprintln!("  --retake best|latest  how a new result replaces the stored one");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACADEMY_DB_URL, ACADEMY_CURRICULUM, ACADEMY_LEARNER_ID,");
    eprintln!("  ACADEMY_COOLDOWN_SECS, ACADEMY_RETAKE_POLICY, ACADEMY_ALLOW_PASSED_RETAKE, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Checkpoints,
    Status,
    Take(CheckpointId),
}

impl Command {
    fn from_args(positional: &[String]) -> Result<Self, ConfigError> {
        match positional {
            [cmd] if cmd == "checkpoints" => Ok(Self::Checkpoints),
            [cmd] if cmd == "status" => Ok(Self::Status),
            [cmd, id] if cmd == "take" => CheckpointId::new(id.as_str())
                .map(Self::Take)
                .map_err(|_| ConfigError::Invalid {
                    key: "checkpoint id",
                    raw: id.clone(),
                }),
            [cmd, ..] => Err(ConfigError::UnknownArg(cmd.clone())),
            [] => Err(ConfigError::UnknownArg(String::new())),
        }
    }
}

fn init_tracing(rust_log: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_curriculum(config: &Config) -> Result<Curriculum, Box<dyn std::error::Error>> {
    Ok(match &config.curriculum_path {
        Some(path) => load_curriculum_file(path)?,
        None => bundled_curriculum()?,
    })
}

fn list_checkpoints(curriculum: &Curriculum) {
    for module in curriculum.modules() {
        println!("module {} {}", module.id(), module.title());
    }
    println!();
    for checkpoint in curriculum.checkpoints() {
        let covers: Vec<String> = checkpoint
            .covers_modules()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "{:<20} {:<32} {} questions, {} min, pass {}%, covers modules {}",
            checkpoint.id().as_str(),
            checkpoint.title(),
            checkpoint.question_count(),
            checkpoint.time_limit_secs() / 60,
            checkpoint.pass_threshold().percent(),
            covers.join(", ")
        );
    }
}

async fn print_status(app: &AppServices, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let learner = config.require_learner()?;
    let overview = app.ledger().overview(learner).await?;

    println!("learner {learner}");
    for module in &overview.modules {
        if module.unlocked {
            println!("  [open]   module {} {}", module.module, module.title);
        } else {
            let blocking: Vec<&str> = module.blocking.iter().map(CheckpointId::as_str).collect();
            println!(
                "  [locked] module {} {} (pass {})",
                module.module,
                module.title,
                blocking.join(", ")
            );
        }
    }
    for checkpoint in &overview.checkpoints {
        let standing = match checkpoint.standing {
            CheckpointStanding::NotAttempted => "not attempted".to_string(),
            CheckpointStanding::Passed { score } => format!("passed {score}"),
            CheckpointStanding::Failed {
                score,
                retry_after: Some(wait),
            } => format!("failed {score}, retry in {}", take::format_wait(wait)),
            CheckpointStanding::Failed {
                score,
                retry_after: None,
            } => format!("failed {score}, retry available"),
        };
        println!("  {:<20} {standing}", checkpoint.checkpoint_id.as_str());
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1).peekable();
    if matches!(argv.peek().map(String::as_str), None | Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let mut config = Config::from_env()?;
    let command = config
        .apply_args(&mut argv)
        .and_then(|positional| Command::from_args(&positional))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;
    init_tracing(&config.rust_log);

    let curriculum = load_curriculum(&config)?;
    if command == Command::Checkpoints {
        list_checkpoints(&curriculum);
        return Ok(());
    }

    // Open + migrate SQLite here so core/services stay free of file handling.
    prepare_sqlite_file(&config.db_url)?;
    let app = AppServices::new_sqlite(&config.db_url, Clock::system(), curriculum, config.policy)
        .await?;

    match command {
        Command::Checkpoints => Ok(()),
        Command::Status => print_status(&app, &config).await,
        Command::Take(checkpoint_id) => {
            let learner = config.require_learner()?;
            take::run(&app, learner, &checkpoint_id).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
