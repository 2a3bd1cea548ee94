mod commands;
mod state;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gitlayer",
    about = "Layer git artifacts into image builds as archives and patches"
)]
#[command(version)]
struct Cli {
    /// Directory containing gitlayer.toml
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ArtifactArgs {
    /// Artifact name (omit for the unnamed artifact)
    #[arg(long, short = 'a')]
    artifact: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the artifact's parameter fingerprint
    Paramshash {
        #[command(flatten)]
        artifact: ArtifactArgs,
    },
    /// Write the full archive for a stage and print its commands
    Archive {
        #[command(flatten)]
        artifact: ArtifactArgs,
        /// Stage name
        #[arg(long)]
        stage: String,
        /// Commit to archive (defaults to the artifact's latest commit)
        #[arg(long)]
        commit: Option<String>,
    },
    /// Write the patch from a previous stage and print its commands
    Patch {
        #[command(flatten)]
        artifact: ArtifactArgs,
        /// Stage name
        #[arg(long)]
        stage: String,
        /// Stage the patch starts from
        #[arg(long)]
        after: String,
        /// Commit to patch to (defaults to the artifact's latest commit)
        #[arg(long)]
        commit: Option<String>,
    },
    /// Print the checksum of the files a stage depends on
    DepsChecksum {
        #[command(flatten)]
        artifact: ArtifactArgs,
        /// Stage name
        #[arg(long)]
        stage: String,
    },
    /// Print the fingerprint of uncommitted changes (dev mode only)
    DevHash {
        #[command(flatten)]
        artifact: ArtifactArgs,
        /// Stage whose recorded archive kind is used
        #[arg(long)]
        stage: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dir = cli.project_dir.as_path();

    match cli.command {
        Commands::Paramshash { artifact } => commands::paramshash(dir, artifact.artifact.as_deref())?,
        Commands::Archive {
            artifact,
            stage,
            commit,
        } => commands::archive(dir, artifact.artifact.as_deref(), &stage, commit.as_deref())?,
        Commands::Patch {
            artifact,
            stage,
            after,
            commit,
        } => commands::patch(
            dir,
            artifact.artifact.as_deref(),
            &stage,
            &after,
            commit.as_deref(),
        )?,
        Commands::DepsChecksum { artifact, stage } => {
            commands::deps_checksum(dir, artifact.artifact.as_deref(), &stage)?
        }
        Commands::DevHash { artifact, stage } => {
            commands::dev_hash(dir, artifact.artifact.as_deref(), stage.as_deref())?
        }
    }

    Ok(())
}
