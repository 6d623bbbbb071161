use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "rowscope-cmd")]
#[command(about = "Command-line browser for JSON tables through a windowed row source")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a table file, position the viewport and print the rendered rows
    View {
        /// JSON array or newline-delimited JSON file holding the table rows
        #[arg(short, long)]
        file: String,

        /// Primary key field of the table
        #[arg(long, default_value = "id")]
        primary_key: String,

        /// Secondary index as `name=dotted.path` (can be specified multiple times)
        #[arg(long = "index")]
        indexes: Vec<String>,

        /// Dotted path of the column to order by (defaults to the primary key)
        #[arg(long)]
        order: Option<String>,

        /// Order descending
        #[arg(long)]
        desc: bool,

        /// Value to seek to, as JSON or plain text
        #[arg(long)]
        seek: Option<String>,

        /// Scroll position of the viewport
        #[arg(long, default_value_t = 0.0)]
        scroll: f64,

        /// Viewport height
        #[arg(long, default_value_t = 480.0)]
        height: f64,

        /// JSON file with viewer options
        #[arg(long)]
        options: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            file,
            primary_key,
            indexes,
            order,
            desc,
            seek,
            scroll,
            height,
            options,
        } => commands::view::run(commands::view::ViewArgs {
            file,
            primary_key,
            indexes,
            order,
            desc,
            seek,
            scroll,
            height,
            options,
        }),
    }
}
