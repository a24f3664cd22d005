use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use macagent::errors::{MacAgentError, MacAgentResult};

#[derive(Parser, Debug)]
#[command(name = "macagent", version, about = "Drive macOS applications with an LLM planner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one task given on the command line
    Run {
        #[arg(long)]
        task: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run the task stored in a JSON file (`{"task": "..."}`)
    Execute {
        file_path: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "debug")]
    log_level: String,
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    /// Names the results/<run-id> directory
    #[arg(long)]
    run_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskFile {
    task: String,
}

fn read_task_file(path: &Path) -> MacAgentResult<String> {
    let content = std::fs::read_to_string(path)?;
    let file: TaskFile = serde_json::from_str(&content)?;
    Ok(file.task)
}

async fn run(task: String, common: CommonArgs) -> MacAgentResult<String> {
    macagent::init_tracing(&common.log_level.to_lowercase(), Some(&common.log_dir))?;
    let run_id = common
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(run_id = %run_id, task = %task, "starting macagent");

    let config = macagent::config::load_config()?;
    let planner = macagent::build_planner(&config, run_id.clone())?;
    let answer = planner.run(&task).await?;
    tracing::info!(run_id = %run_id, answer = %answer, "macagent finished");
    Ok(answer)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { task, common } => run(task, common).await,
        Commands::Execute { file_path, common } => match read_task_file(&file_path) {
            Ok(task) => run(task, common).await,
            Err(e) => Err(MacAgentError::Config(format!("{}: {e}", file_path.display()))),
        },
    };

    match result {
        Ok(answer) => {
            println!("Agent Response: {answer}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "macagent failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
