//! CLI subcommand implementations for the `ese` binary.
//!
//! The `ese` binary provides six subcommands for inspecting ESE databases.
//! CLI argument parsing uses clap derive macros, with the top-level
//! [`app::Cli`] struct and [`app::Commands`] enum defined in [`app`] and
//! shared between `main.rs` and `build.rs` (for man page generation) via
//! `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct
//! holding the parsed arguments and a `pub fn execute(opts, writer) ->
//! Result<(), EseError>` entry point. The `writer: &mut dyn Write`
//! parameter allows output to be captured in tests or redirected to a file
//! via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `ese tables` | [`tables`] | List every table the catalog describes |
//! | `ese schema` | [`schema`] | Show a table's columns and indexes |
//! | `ese dump` | [`dump`] | Dump a table's records as JSON |
//! | `ese page` | [`page`] | Hex dump of a raw page's bytes |
//! | `ese find` | [`find`] | Search a table for records matching a column value |
//! | `ese info` | [`info`] | Inspect the database header |
//!
//! # Common patterns
//!
//! - **`--json`** — Every subcommand that lists structured data supports
//!   JSON output via `serde_json`.
//! - **`--color`** (global) — Control colored terminal output (`auto`,
//!   `always`, `never`).
//! - **`--output` / `-o`** (global) — Redirect output to a file instead of
//!   stdout.
//!
//! A progress bar (via [`indicatif`]) is displayed for `ese dump` and `ese
//! find` when scanning large tables. The `wprintln!` and `wprint!` macros
//! wrap `writeln!`/`write!` to convert `io::Error` into `EseError`.

pub mod app;
pub mod dump;
pub mod find;
pub mod info;
pub mod page;
pub mod schema;
pub mod tables;

/// Write a line to the given writer, converting io::Error to EseError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::EseError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::EseError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to EseError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::EseError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

use indicatif::{ProgressBar, ProgressStyle};

use crate::esedb::RecordValue;

/// Render a decoded value as `serde_json::Value`, the way every subcommand
/// that prints records wants it: binary/GUID columns as hex/canonical
/// strings rather than raw byte arrays.
pub(crate) fn record_value_to_json(value: &RecordValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        RecordValue::Null => Value::Null,
        RecordValue::Bool(b) => Value::Bool(*b),
        RecordValue::I64(n) => Value::from(*n),
        RecordValue::U64(n) => Value::from(*n),
        RecordValue::F32(f) => Value::from(*f as f64),
        RecordValue::F64(f) => Value::from(*f),
        RecordValue::Text(s) => Value::String(s.clone()),
        RecordValue::Bytes(b) => Value::String(crate::util::hex::format_bytes(b)),
        RecordValue::Guid(g) => Value::String(g.clone()),
        RecordValue::List(items) => Value::Array(items.iter().map(record_value_to_json).collect()),
    }
}

/// Create a styled progress bar for iterating over records or pages.
pub(crate) fn create_progress_bar(count: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(count);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
                unit
            ))
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}
