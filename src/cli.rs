use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pydeps",
    about = "Collect and apply dependency updates for Python projects",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inventory current dependencies and propose updates
    Collect {
        /// Manifest to start from (requirements file, Pipfile or pyproject.toml)
        #[arg(value_name = "MANIFEST")]
        manifest: String,

        /// Where to write the inventory JSON
        #[arg(value_name = "OUTPUT")]
        output: String,
    },

    /// Apply the updates listed in an inventory
    Act {
        /// Inventory produced by `collect` (possibly edited)
        #[arg(value_name = "INPUT")]
        input: String,

        /// Where to write the inventory of applied updates
        #[arg(value_name = "OUTPUT")]
        output: String,
    },
}
