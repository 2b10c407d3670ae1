use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::config::SymsOptions;
use crate::elf::ElfFile;
use crate::error::Result;
use crate::render::{self, OutputFormat};
use crate::symbol::Symbol;

/// Reads the configured table of `path` and prepares every entry for
/// display, keeping the table order.
pub fn load<P: AsRef<Path>>(path: P, options: &SymsOptions) -> Result<Vec<Symbol>> {
    let file = ElfFile::open(path)?;
    let raw = file.symbols(options.table)?;
    Ok(raw
        .iter()
        .map(|raw| Symbol::from_raw(raw, options.demangle))
        .collect())
}

/// Lists the symbols of each file in turn.
///
/// The output destination is created once the first table has been read.
/// With several files, text tables are preceded by the file name and JSON
/// arrays are written one per line.
pub fn run<P: AsRef<Path>>(options: &SymsOptions, paths: &[P]) -> Result<()> {
    let titled = paths.len() > 1 && options.format == OutputFormat::Text;
    let mut out: Option<Box<dyn Write>> = None;

    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let symbols = load(path, options)?;
        info!("{}: {} symbols", path.display(), symbols.len());

        let mut writer = match out.take() {
            Some(writer) => writer,
            None => options.output.open()?,
        };
        if titled {
            render::write_file_title(&mut writer, path, i == 0)?;
        }
        render::write_symbols(&mut writer, options.format, &symbols)?;
        out = Some(writer);
    }

    if let Some(mut writer) = out {
        writer.flush()?;
    }
    Ok(())
}
