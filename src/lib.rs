//! Read-only decoder for the Extensible Storage Engine (ESE) database format.
//!
//! The `esedb-utils` crate (library name `esedb`) provides Rust types and
//! functions for parsing ESE databases (`.edb`, `.dat`) such as
//! `SRUDB.dat`, the Windows Search index, and the User Access Logging
//! database, without any dependency on the Windows ESE engine itself.
//!
//! # CLI Reference
//!
//! Install the `ese` binary and use its subcommands to inspect ESE
//! databases from the command line.
//!
//! ## Installation
//!
//! ```text
//! cargo install esedb-utils          # crates.io
//! brew install ringo380/tap/ese      # Homebrew (macOS/Linux)
//! ```
//!
//! ## Subcommands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | [`ese tables`](cli::app::Commands::Tables) | List every table the catalog describes |
//! | [`ese schema`](cli::app::Commands::Schema) | Show a table's columns and indexes |
//! | [`ese dump`](cli::app::Commands::Dump) | Dump a table's records as JSON |
//! | [`ese page`](cli::app::Commands::Page) | Hex dump of a raw page's bytes |
//! | [`ese find`](cli::app::Commands::Find) | Search an index for a matching record |
//! | [`ese info`](cli::app::Commands::Info) | Inspect the database header |
//!
//! ## Global options
//!
//! All subcommands accept `--color <auto|always|never>` and `--output <file>`.
//! Most subcommands also accept `--json` for machine-readable output and
//! `--impacket-compat` to mimic impacket's `ESENT_DB` value shapes.
//!
//! See the [`cli`] module for full details.
//!
//! # Library API
//!
//! Add `esedb` as a dependency to use the parsing library directly:
//!
//! ```toml
//! [dependencies]
//! esedb = { package = "esedb-utils", version = "1", default-features = false }
//! ```
//!
//! ## Quick example
//!
//! ```no_run
//! use esedb::esedb::db::EseDB;
//!
//! // Open a database (page size and shadow header are validated on open)
//! let db = EseDB::open("SRUDB.dat").unwrap();
//!
//! // Walk a table's records
//! let table = db.table("SruDbIdMapTable").unwrap();
//! for record in db.records(table).unwrap() {
//!     let record = record.unwrap();
//!     println!("{:?}", record.get("IdIndex"));
//! }
//! ```
//!
//! ## Key entry points
//!
//! | Type / Function | Purpose |
//! |-----------------|---------|
//! | [`EseDB`](esedb::db::EseDB) | Open a database, list tables, iterate records |
//! | [`Table`](esedb::table::Table) | A table's columns, indexes, and record iterator |
//! | [`Record`](esedb::record::Record) | A single decoded row, column-by-name lookup |
//! | [`RecordValue`](esedb::RecordValue) | The typed union every decoded value is returned as |
//! | [`Index`](esedb::index::Index) | Secondary-index metadata and key encoding |
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`esedb::header`] | `DBFILEHDR` parsing and shadow-header verification |
//! | [`esedb::pager`] | Page-granular file access and caching |
//! | [`esedb::page`] | Page/tag/node decoding |
//! | [`esedb::btree`] | B+ tree cursor and leaf-node walking |
//! | [`esedb::catalog`] | Catalog bootstrap (`MSysObjects`-equivalent schema scan) |
//! | [`esedb::table`] | Table metadata built from the catalog |
//! | [`esedb::column`] | Column metadata and storage-class helpers |
//! | [`esedb::record`] | Row decoding: fixed/variable/tagged columns |
//! | [`esedb::longvalue`] | Out-of-line blob reassembly |
//! | [`esedb::index`] | Secondary-index key encoding |
//! | [`esedb::sortkey`] | Text collation for index key normalization |
//! | [`esedb::compression`] | 7-bit and LZXPRESS decompression |
//! | [`esedb::value`] | `JET_coltyp` decode table and `RecordValue` |
//! | [`esedb::db`] | The top-level `EseDB` handle |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `ese` binary and enables `mmap`-backed file access. |

pub mod error;
pub mod esedb;

#[cfg(feature = "cli")]
pub mod cli;
pub mod util;

pub use error::EseError;
