use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::symbol::Symbol;
use crate::table::Table;

const HEADER: [&str; 9] = [
    "Binding",
    "Type",
    "Visibility",
    "Library",
    "Version",
    "Value",
    "Size",
    "NameVersion",
    "Name",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where listings are written
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Opens the destination, truncating an existing file
    pub fn open(&self) -> Result<Box<dyn Write>> {
        match self {
            OutputTarget::Stdout => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
            OutputTarget::File(path) => {
                let file = File::create(path).map_err(|source| Error::CreateOutput {
                    path: path.clone(),
                    source,
                })?;
                debug!("writing to {}", path.display());
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }
}

pub fn symbol_table(symbols: &[Symbol]) -> Table {
    let mut table = Table::new();
    table.push_header(&HEADER);
    for sym in symbols {
        table.push_row([
            sym.binding.clone(),
            sym.kind.clone(),
            sym.visibility.clone(),
            sym.library.clone(),
            sym.version.clone(),
            sym.value.to_string(),
            sym.size.to_string(),
            sym.name_version.clone(),
            sym.name.clone(),
        ]);
    }
    table
}

pub fn write_text<W: Write>(out: &mut W, symbols: &[Symbol]) -> Result<()> {
    symbol_table(symbols).write_to(out)?;
    Ok(())
}

/// One JSON array followed by a newline
pub fn write_json<W: Write>(out: &mut W, symbols: &[Symbol]) -> Result<()> {
    serde_json::to_writer(&mut *out, symbols).map_err(|e| {
        if e.is_io() {
            Error::Write(e.into())
        } else {
            Error::Json(e)
        }
    })?;
    out.write_all(b"\n")?;
    Ok(())
}

pub fn write_symbols<W: Write>(
    out: &mut W,
    format: OutputFormat,
    symbols: &[Symbol],
) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(out, symbols),
        OutputFormat::Json => write_json(out, symbols),
    }
}

/// Title line printed above each table when several files are listed
pub fn write_file_title<W: Write>(out: &mut W, path: &Path, first: bool) -> Result<()> {
    if !first {
        out.write_all(b"\n")?;
    }
    writeln!(out, "{}:", path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<Symbol> {
        vec![
            Symbol {
                binding: "STB_GLOBAL".to_owned(),
                kind: "STT_FUNC".to_owned(),
                visibility: "STV_DEFAULT".to_owned(),
                library: "libc.so.6".to_owned(),
                version: "GLIBC_2.2.5".to_owned(),
                value: 0,
                size: 0,
                name_version: String::new(),
                name: "puts".to_owned(),
            },
            Symbol {
                binding: "STB_LOCAL".to_owned(),
                kind: "STT_OBJECT".to_owned(),
                visibility: "STV_HIDDEN".to_owned(),
                library: String::new(),
                version: String::new(),
                value: 16400,
                size: 8,
                name_version: "@@V1".to_owned(),
                name: "counter".to_owned(),
            },
        ]
    }

    #[test]
    fn text_layout() {
        let mut out = Vec::new();
        write_symbols(&mut out, OutputFormat::Text, &symbols()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "Binding     Type        Visibility   Library    Version      Value  Size  NameVersion  Name"
        );
        assert_eq!(
            lines[1],
            "-------     ----        ----------   -------    -------      -----  ----  -----------  ----"
        );
        assert_eq!(
            lines[2],
            "STB_GLOBAL  STT_FUNC    STV_DEFAULT  libc.so.6  GLIBC_2.2.5  0      0                  puts"
        );
        assert_eq!(
            lines[3],
            "STB_LOCAL   STT_OBJECT  STV_HIDDEN                           16400  8     @@V1         counter"
        );
    }

    #[test]
    fn text_without_symbols_has_header() {
        let mut out = Vec::new();
        write_text(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn json_matches_text() {
        let symbols = symbols();
        let mut out = Vec::new();
        write_symbols(&mut out, OutputFormat::Json, &symbols).unwrap();
        assert!(out.ends_with(b"]\n"));

        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&out).unwrap();
        let table = symbol_table(&symbols);
        let mut text = Vec::new();
        table.write_to(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();

        for (obj, line) in parsed.iter().zip(text.lines().skip(2)) {
            let cells: Vec<_> = line.split_whitespace().collect();
            for cell in &cells {
                let found = HEADER.iter().any(|key| match &obj[*key] {
                    serde_json::Value::String(s) => s == cell,
                    serde_json::Value::Number(n) => n.to_string() == *cell,
                    _ => false,
                });
                assert!(found, "{cell} not in {obj}");
            }
        }
        assert_eq!(parsed[1]["Value"], 16400);
        assert_eq!(parsed[1]["NameVersion"], "@@V1");
    }

    #[test]
    fn json_empty_array() {
        let mut out = Vec::new();
        write_json(&mut out, &[]).unwrap();
        assert_eq!(out, b"[]\n");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_keep_io_kind() {
        for format in [OutputFormat::Text, OutputFormat::Json] {
            let err = write_symbols(&mut ClosedPipe, format, &symbols()).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Output);
            assert!(
                matches!(&err, Error::Write(e) if e.kind() == io::ErrorKind::BrokenPipe),
                "{format:?}: {err:?}"
            );
        }
    }

    #[test]
    fn create_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::File(dir.path().join("missing").join("out.txt"));
        let err = target.open().err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Output);
    }
}
