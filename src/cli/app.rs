use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ese")]
#[command(about = "Extensible Storage Engine (ESE) database reader")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every table the catalog describes
    Tables {
        /// Path to the ESE database file (.edb, .dat)
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show a table's columns and indexes
    Schema {
        /// Path to the ESE database file
        #[arg(short, long)]
        file: String,

        /// Table name to describe
        #[arg(short, long)]
        table: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Dump a table's records
    Dump {
        /// Path to the ESE database file
        #[arg(short, long)]
        file: String,

        /// Table name to dump
        #[arg(short, long)]
        table: String,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Decode values the way impacket's ESENT_DB reader would
        #[arg(long = "impacket-compat")]
        impacket_compat: bool,
    },

    /// Hex dump of a raw page's bytes
    Page {
        /// Path to the ESE database file
        #[arg(short, long)]
        file: String,

        /// Logical page number to dump (1-based)
        #[arg(short, long)]
        page: u32,
    },

    /// Search a table for records matching a column value
    Find {
        /// Path to the ESE database file
        #[arg(short, long)]
        file: String,

        /// Table name to search
        #[arg(short, long)]
        table: String,

        /// Column name to match against
        #[arg(short, long)]
        column: String,

        /// Value to match, compared against each record's decoded value
        #[arg(short, long)]
        value: String,

        /// Stop at the first match
        #[arg(long)]
        first: bool,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Inspect the database header
    Info {
        /// Path to the ESE database file
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}
