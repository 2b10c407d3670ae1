use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "buddy", version, about = "Inspect the libraries and symbols of ELF files")]
pub struct Opt {
    /// Log progress to stderr, repeat for more detail
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// TOML file with default options
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print imported libraries
    Libs {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print symbols
    Syms(SymsArgs),
}

#[derive(Args, Debug, Default)]
pub struct SymsArgs {
    /// How to demangle C++/Rust names: none, short, full [default: short]
    #[clap(long)]
    pub demangle: Option<String>,
    /// Symbol table to read: symtab or dynsym [default: symtab]
    #[clap(long)]
    pub table: Option<String>,
    /// Path to output file
    #[clap(short, long)]
    pub output: Option<PathBuf>,
    /// Write output as JSON
    #[clap(long, overrides_with = "no_json")]
    pub json: bool,
    /// Write a text table, even if the config file asks for JSON
    #[clap(long, overrides_with = "json")]
    pub no_json: bool,
    #[clap(required = true)]
    pub paths: Vec<PathBuf>,
}
