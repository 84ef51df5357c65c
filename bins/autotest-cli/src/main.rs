mod commands;

use anyhow::Result;
use autotest_common::config::{LogFormat, DEFAULT_REDIS_URL};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autotest-cli")]
#[command(about = "Autotest CLI - Manage the autotests and grading script of a task", long_about = None)]
struct Cli {
    /// Redis instance holding the task's tests
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL, global = true)]
    redis_url: String,

    /// Course code (e.g., COMP1511)
    #[arg(short, long)]
    course: String,

    /// Task name; `~` stands for a space
    #[arg(short, long)]
    task: String,

    #[command(subcommand)]
    command: Commands,
}

/// Fields shared by `add` and `edit`
#[derive(Args, Debug, Default)]
pub struct DefinitionArgs {
    /// Input given to the program, as text
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Expected output, as text
    #[arg(long, conflicts_with = "output_file")]
    pub output: Option<String>,

    /// Read the input from a file
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Read the expected output from a file
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Extra arguments passed to the run script
    #[arg(long)]
    pub runner_args: Option<String>,

    /// CPU time limit in seconds
    #[arg(long)]
    pub cpu: Option<String>,

    /// Memory limit in megabytes
    #[arg(long)]
    pub memory: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the hidden and sample tests, newest first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one test definition
    Show {
        name: String,

        /// The test is a hidden (automark) test
        #[arg(long)]
        hidden: bool,
    },

    /// Add a new test
    Add {
        name: String,

        /// Store as a hidden (automark) test instead of a sample
        #[arg(long)]
        hidden: bool,

        #[command(flatten)]
        definition: DefinitionArgs,
    },

    /// Edit a stored test in place
    Edit {
        name: String,

        /// The test is a hidden (automark) test
        #[arg(long)]
        hidden: bool,

        /// New name
        #[arg(long)]
        rename: Option<String>,

        /// Move the test to the hidden (true) or sample (false) class
        #[arg(long)]
        make_hidden: Option<bool>,

        #[command(flatten)]
        definition: DefinitionArgs,
    },

    /// Delete a test
    Delete {
        name: String,

        /// The test is a hidden (automark) test
        #[arg(long)]
        hidden: bool,
    },

    /// Replace the grading script on both targets
    UploadScript {
        /// Path to the script
        path: PathBuf,
    },

    /// Save the current grading script
    DownloadScript {
        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Show or change the output tolerance filters
    Tolerance {
        #[arg(long)]
        trailing_newline: Option<bool>,

        #[arg(long)]
        trailing_whitespaces: Option<bool>,

        #[arg(long)]
        whitespaces_amount: Option<bool>,

        #[arg(long)]
        case_differences: Option<bool>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(autotest_common::config::Config::from_env().log_format);

    let session = commands::Session::connect(&cli.redis_url, &cli.course, &cli.task).await?;

    match cli.command {
        Commands::List { json } => commands::list(session, json).await?,
        Commands::Show { name, hidden } => commands::show(session, &name, hidden).await?,
        Commands::Add {
            name,
            hidden,
            definition,
        } => commands::add(session, &name, hidden, definition).await?,
        Commands::Edit {
            name,
            hidden,
            rename,
            make_hidden,
            definition,
        } => {
            commands::edit(
                session,
                &name,
                hidden,
                rename.as_deref(),
                make_hidden,
                definition,
            )
            .await?
        }
        Commands::Delete { name, hidden } => commands::delete(session, &name, hidden).await?,
        Commands::UploadScript { path } => commands::upload_script(session, &path).await?,
        Commands::DownloadScript { out_dir } => commands::download_script(session, &out_dir).await?,
        Commands::Tolerance {
            trailing_newline,
            trailing_whitespaces,
            whitespaces_amount,
            case_differences,
        } => {
            commands::tolerance(
                session,
                commands::ToleranceChanges {
                    trailing_newline,
                    trailing_whitespaces,
                    whitespaces_amount,
                    case_differences,
                },
            )
            .await?
        }
    }

    Ok(())
}
