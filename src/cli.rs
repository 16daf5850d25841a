use clap::{Parser, Subcommand};

/// Field Service Copilot: ask Dataverse questions in plain language
#[derive(Parser)]
#[command(name = "fs-copilot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one chat message through the pipeline and print the reply
    Ask {
        /// Bearer token of the user to act for
        #[arg(long, env = "COPILOT_USER_TOKEN", hide_env_values = true)]
        token: String,
        /// The question, e.g. "show my active work orders in Seattle"
        message: String,
    },

    /// Fetch the identity provider's signing keys and list them
    Keys,
}
