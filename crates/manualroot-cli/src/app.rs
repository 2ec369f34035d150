//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manualroot")]
#[command(
    author,
    version,
    about = "Troubleshooting assistant over brand-scoped elevator manuals"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage brand collections
    Brand(BrandArgs),

    /// Index a document's extracted text
    Index(IndexArgs),

    /// Hybrid search within a brand
    Search(SearchArgs),

    /// Send a message to a conversation
    Chat(ChatArgs),

    /// Show the turns of a conversation
    History(HistoryArgs),

    /// Show index status
    Status,
}

#[derive(Args)]
pub struct BrandArgs {
    #[command(subcommand)]
    pub action: BrandAction,
}

#[derive(Subcommand)]
pub enum BrandAction {
    /// Register a brand collection
    Add {
        slug: String,
        /// Display name (defaults to the slug)
        #[arg(long)]
        name: Option<String>,
    },
    /// List brands
    List,
    /// List the documents of a brand
    #[command(alias = "docs")]
    Documents { slug: String },
}

#[derive(Args)]
pub struct IndexArgs {
    /// Brand slug
    pub brand: String,

    /// Text file with pages separated by form feeds
    pub file: PathBuf,

    /// Filename stored for the document (defaults to the file name)
    #[arg(long)]
    pub filename: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Brand slug
    pub brand: String,

    /// Search query
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Number of results
    #[arg(short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ChatArgs {
    /// Brand slug
    pub brand: String,

    /// Message
    #[arg(required = true)]
    pub message: Vec<String>,

    /// Continue an existing conversation
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Participant identifier
    #[arg(long, default_value = "cli")]
    pub participant: String,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Conversation id
    pub conversation_id: String,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
