use clap::Parser;
use clap::Subcommand;

/// Generate and run HTTP smoke tests from a YAML suite definition
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a sample smoke.yml configuration file
    Init {
        /// Path to create the config at
        #[arg(short, long, default_value = "smoke.yml")]
        path: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate the test plan from smoke.yml without running it
    Generate {
        /// Path to the suite definition
        #[arg(short, long, default_value = "smoke.yml")]
        config: String,

        /// Where to write the generated plan
        #[arg(short, long, default_value = "smoke_plan.json")]
        output: String,

        /// Print the generated plan without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate the test plan and run it against the live service
    Run {
        /// Path to the suite definition
        #[arg(short, long, default_value = "smoke.yml")]
        config: String,
    },
}
