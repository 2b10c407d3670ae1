use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::elf::ElfFile;
use crate::error::Result;

/// Prints the libraries each file needs, one per line. Stops at the
/// first file that fails.
pub fn run<W: Write, P: AsRef<Path>>(out: &mut W, paths: &[P]) -> Result<()> {
    for path in paths {
        let file = ElfFile::open(path)?;
        let libs = file.imported_libraries()?;
        info!("{}: {} needed libraries", file.path().display(), libs.len());
        for lib in libs {
            writeln!(out, "{lib}")?;
        }
    }
    out.flush()?;
    Ok(())
}
