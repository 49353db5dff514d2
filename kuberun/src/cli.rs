mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{kubectl::Kubectl, Result};

/// Selects the cluster and namespace every subcommand talks to.
#[derive(Debug, Args)]
pub struct ClusterArgs {
    /// The namespace to create objects in.
    #[arg(long, short = 'n', global = true, default_value = "default")]
    namespace: String,

    /// The kubeconfig context to use instead of the current one.
    #[arg(long, global = true)]
    context: Option<String>,

    /// Path to the kubeconfig file to use instead of the default one.
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,
}

impl ClusterArgs {
    pub fn kubectl(&self) -> Kubectl {
        Kubectl::new(self.context.clone(), self.kubeconfig.clone())
    }
}

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    cluster: ClusterArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create and run a particular image, possibly replicated
    #[command(arg_required_else_help = true)]
    Run(run::RunArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => {
                run::run(&self.cluster, args)?;
            }
        }

        Ok(())
    }
}
