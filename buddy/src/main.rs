use std::io;
use std::process::exit;

use anyhow::Result;
use buddy::args::{Commands, Opt};
use buddy::config::{BuddyConfig, SymsOptions};
use clap::Parser;
use tracing::{debug, Level};

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run(opt: Opt) -> Result<()> {
    match opt.command {
        Commands::Libs { paths } => {
            buddy::libs::run(&mut io::stdout().lock(), &paths)?;
        }
        Commands::Syms(args) => {
            let config = match &opt.config {
                Some(path) => BuddyConfig::from_path(path)?,
                None => BuddyConfig::default(),
            };
            // validate everything before the first file is opened
            let options = SymsOptions::resolve(&args, &config.syms)?;
            debug!("{:?}", options);
            buddy::syms::run(&options, &args.paths)?;
        }
    }
    Ok(())
}

/// The reader of our stdout went away, e.g. `buddy syms a.out | head`
fn is_broken_pipe(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .map_or(false, |e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

fn main() {
    let opt = Opt::parse();
    init_logger(opt.verbose);

    if let Err(e) = run(opt) {
        if is_broken_pipe(&e) {
            debug!("stdout closed");
            return;
        }
        eprintln!("error: {e:#}");
        exit(1);
    }
}
