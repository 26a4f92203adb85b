mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "compilebot-cli")]
#[command(about = "CompileBot CLI - Compile files and inspect the catalog and grading data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file through the remote backend
    Compile {
        /// Source file to compile
        #[arg(short, long)]
        file: PathBuf,

        /// Language name, alias or compiler id (e.g., python, cpp, gcc-head)
        #[arg(short, long)]
        language: String,

        /// Compiler options, space or comma separated
        #[arg(short, long)]
        options: Option<String>,

        /// Program stdin
        #[arg(short, long)]
        stdin: Option<String>,

        /// Grading level; supplies stdin and grades output when no stdin is given
        #[arg(long)]
        level: Option<String>,
    },

    /// List catalog languages and their compilers
    Languages {
        /// Only show languages containing this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Print the expected stdin and stdout of a grading level
    Expected {
        /// Grading level
        #[arg(short, long)]
        level: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            file,
            language,
            options,
            stdin,
            level,
        } => {
            commands::compile(&file, &language, options, stdin, level.as_deref()).await?;
        }
        Commands::Languages { filter } => {
            commands::list_languages(filter.as_deref()).await?;
        }
        Commands::Expected { level } => {
            commands::show_expected(&level).await?;
        }
    }

    Ok(())
}
