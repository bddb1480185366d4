use clap::{Parser, Subcommand};

/// Notewright — AI assistant for a Markdown note vault
#[derive(Parser, Debug)]
#[command(name = "notewright")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent loop: the model reads, writes, creates, renames (and
    /// optionally deletes) notes to carry out the instruction
    Agent {
        /// Natural-language instruction
        #[arg(value_name = "INSTRUCTION")]
        instruction: String,

        /// Vault root directory
        #[arg(long, value_name = "DIR", default_value = ".", env = "NOTEWRIGHT_VAULT")]
        vault: String,

        /// Launch the run "from inside" this note: its path and content
        /// are prefixed to the instruction
        #[arg(long, value_name = "NOTE")]
        context: Option<String>,

        /// Override the round cap (default: 50, or NOTEWRIGHT_MAX_ITERATIONS)
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Offer the delete tool to the model for this run
        #[arg(long, default_value = "false")]
        allow_delete: bool,

        /// Print the result as JSON instead of a summary
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Rewrite a single note: the model returns the complete replacement
    /// content, which is written back (or printed with --stdout)
    Rewrite {
        /// Vault-relative note path
        #[arg(value_name = "NOTE")]
        note: String,

        /// Natural-language instruction
        #[arg(value_name = "INSTRUCTION")]
        instruction: String,

        /// Vault root directory
        #[arg(long, value_name = "DIR", default_value = ".", env = "NOTEWRIGHT_VAULT")]
        vault: String,

        /// Print the rewritten content instead of writing it back
        #[arg(long, default_value = "false")]
        stdout: bool,
    },
}
