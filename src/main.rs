#[cfg(not(feature = "cli"))]
compile_error!("The `ese` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use esedb::cli;
use esedb::cli::app::{Cli, ColorMode, Commands};
use esedb::EseError;

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, EseError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| EseError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Tables { file, json } => {
            cli::tables::execute(&cli::tables::TablesOptions { file, json }, &mut writer)
        }

        Commands::Schema { file, table, json } => cli::schema::execute(
            &cli::schema::SchemaOptions { file, table, json },
            &mut writer,
        ),

        Commands::Dump {
            file,
            table,
            limit,
            pretty,
            impacket_compat,
        } => cli::dump::execute(
            &cli::dump::DumpOptions {
                file,
                table,
                limit,
                pretty,
                impacket_compat,
            },
            &mut writer,
        ),

        Commands::Page { file, page } => {
            cli::page::execute(&cli::page::PageOptions { file, page }, &mut writer)
        }

        Commands::Find {
            file,
            table,
            column,
            value,
            first,
            pretty,
        } => cli::find::execute(
            &cli::find::FindOptions {
                file,
                table,
                column,
                value,
                first,
                pretty,
            },
            &mut writer,
        ),

        Commands::Info { file, json } => {
            cli::info::execute(&cli::info::InfoOptions { file, json }, &mut writer)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
