use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use object::elf::{self, FileHeader32, FileHeader64};
use object::read::elf::{Dyn, FileHeader, SectionHeader, SectionTable, Sym};
use object::{Endianness, FileKind};
use symbolic::common::ByteView;
use tracing::{debug, trace};

use crate::error::{Error, FormatError, Result};

/// Version indices below this are `VER_NDX_LOCAL` and `VER_NDX_GLOBAL`
const FIRST_VERSION_INDEX: u16 = 2;
const VERSYM_INDEX_MASK: u16 = 0x7fff;

/// Which symbol table to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolTable {
    /// `.symtab`, the static symbol table
    #[default]
    Symtab,
    /// `.dynsym`, the symbols needed for dynamic linking
    Dynsym,
}

impl SymbolTable {
    fn section_type(self) -> u32 {
        match self {
            SymbolTable::Symtab => elf::SHT_SYMTAB,
            SymbolTable::Dynsym => elf::SHT_DYNSYM,
        }
    }
}

impl FromStr for SymbolTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "symtab" => Ok(SymbolTable::Symtab),
            "dynsym" => Ok(SymbolTable::Dynsym),
            _ => Err(Error::UnknownSymbolTable(s.to_owned())),
        }
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolTable::Symtab => f.write_str("symtab"),
            SymbolTable::Dynsym => f.write_str("dynsym"),
        }
    }
}

/// A symbol table entry as stored in the file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSymbol {
    /// Name from the string table, including any `@version` suffix
    pub name: String,
    /// `st_info`: binding in the high nibble, type in the low nibble
    pub info: u8,
    /// `st_other`: visibility in the low two bits
    pub other: u8,
    /// File that provides the needed version, dynamic symbols only
    pub library: String,
    /// Symbol version name, dynamic symbols only
    pub version: String,
    pub value: u64,
    pub size: u64,
}

/// A mapped ELF file.
///
/// The mapping is released when the value is dropped.
pub struct ElfFile {
    path: PathBuf,
    kind: FileKind,
    data: ByteView<'static>,
}

impl fmt::Debug for ElfFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElfFile")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ElfFile {
    /// Maps `path` and checks that it holds a 32 or 64 bit ELF image
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = ByteView::open(path).map_err(|source| Error::Open {
            path: path.to_owned(),
            source,
        })?;
        let kind = match FileKind::parse(&*data) {
            Ok(kind @ (FileKind::Elf32 | FileKind::Elf64)) => kind,
            _ => {
                return Err(Error::Format {
                    path: path.to_owned(),
                    source: FormatError::NotElf,
                })
            }
        };
        debug!("opened {} ({:?}, {} bytes)", path.display(), kind, data.len());

        Ok(Self {
            path: path.to_owned(),
            kind,
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `DT_NEEDED` entries of the dynamic section, in file order.
    ///
    /// A file without a dynamic section needs nothing.
    pub fn imported_libraries(&self) -> Result<Vec<String>> {
        let data = &*self.data;
        let libs = match self.kind {
            FileKind::Elf32 => needed_libraries::<FileHeader32<Endianness>>(data),
            _ => needed_libraries::<FileHeader64<Endianness>>(data),
        };
        libs.map_err(|source| self.format_error(source))
    }

    /// Reads every entry of `table` except the reserved null symbol
    pub fn symbols(&self, table: SymbolTable) -> Result<Vec<RawSymbol>> {
        let data = &*self.data;
        let symbols = match self.kind {
            FileKind::Elf32 => raw_symbols::<FileHeader32<Endianness>>(data, table),
            _ => raw_symbols::<FileHeader64<Endianness>>(data, table),
        };
        let symbols = symbols.map_err(|source| self.format_error(source))?;
        debug!("{}: {} entries in {}", self.path.display(), symbols.len(), table);
        Ok(symbols)
    }

    fn format_error(&self, source: FormatError) -> Error {
        Error::Format {
            path: self.path.clone(),
            source,
        }
    }
}

fn needed_libraries<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
) -> Result<Vec<String>, FormatError> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    let sections = header.sections(endian, data)?;

    let (dynamic, link) = match sections.dynamic(endian, data)? {
        Some(dynamic) => dynamic,
        None => {
            trace!("no dynamic section");
            return Ok(Vec::new());
        }
    };
    let strings = sections.strings(endian, data, link)?;

    let mut libs = Vec::new();
    for entry in dynamic {
        let tag: u64 = entry.d_tag(endian).into();
        if tag == u64::from(elf::DT_NULL) {
            break;
        }
        if tag != u64::from(elf::DT_NEEDED) {
            continue;
        }
        let offset: u64 = entry.d_val(endian).into();
        let name = u32::try_from(offset)
            .ok()
            .and_then(|offset| strings.get(offset).ok())
            .ok_or(FormatError::BadStringOffset(offset))?;
        libs.push(String::from_utf8_lossy(name).into_owned());
    }
    Ok(libs)
}

fn raw_symbols<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
    table: SymbolTable,
) -> Result<Vec<RawSymbol>, FormatError> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    let sections = header.sections(endian, data)?;

    let sh_type = table.section_type();
    if !sections.iter().any(|section| section.sh_type(endian) == sh_type) {
        return Err(FormatError::NoSymbols(table));
    }
    let symbols = sections.symbols(endian, data, sh_type)?;
    let versions = match table {
        SymbolTable::Dynsym => Versions::parse(&sections, endian, data)?,
        SymbolTable::Symtab => Versions::default(),
    };

    let mut raw = Vec::with_capacity(symbols.len().saturating_sub(1));
    for (index, sym) in symbols.iter().enumerate().skip(1) {
        let name = sym.name(endian, symbols.strings())?;
        let (library, version) = versions.lookup(index);
        raw.push(RawSymbol {
            name: String::from_utf8_lossy(name).into_owned(),
            info: sym.st_info(),
            other: sym.st_other(),
            library,
            version,
            value: sym.st_value(endian).into(),
            size: sym.st_size(endian).into(),
        });
    }
    Ok(raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Version {
    library: String,
    name: String,
}

/// GNU symbol versioning: `.gnu.version` indexes into the versions
/// declared by `.gnu.version_d` and `.gnu.version_r`.
#[derive(Debug, Default)]
struct Versions {
    versym: Vec<u16>,
    by_index: HashMap<u16, Version>,
}

impl Versions {
    fn parse<'data, Elf: FileHeader<Endian = Endianness>>(
        sections: &SectionTable<'data, Elf>,
        endian: Endianness,
        data: &'data [u8],
    ) -> Result<Self, FormatError> {
        let mut versions = Versions::default();

        for section in sections.iter() {
            if let Some((versym, _)) = section.gnu_versym(endian, data)? {
                versions.versym = versym.iter().map(|v| v.0.get(endian)).collect();
            }

            if let Some((mut verdefs, link)) = section.gnu_verdef(endian, data)? {
                let strings = sections.strings(endian, data, link)?;
                while let Some((verdef, mut verdauxs)) = verdefs.next()? {
                    // the first aux entry names the version itself, the rest are parents
                    if let Some(verdaux) = verdauxs.next()? {
                        let name = verdaux.name(endian, strings)?;
                        versions.by_index.insert(
                            verdef.vd_ndx.get(endian),
                            Version {
                                library: String::new(),
                                name: String::from_utf8_lossy(name).into_owned(),
                            },
                        );
                    }
                }
            }

            if let Some((mut verneeds, link)) = section.gnu_verneed(endian, data)? {
                let strings = sections.strings(endian, data, link)?;
                while let Some((verneed, mut vernauxs)) = verneeds.next()? {
                    let file = String::from_utf8_lossy(verneed.file(endian, strings)?).into_owned();
                    while let Some(vernaux) = vernauxs.next()? {
                        let name = vernaux.name(endian, strings)?;
                        versions.by_index.insert(
                            vernaux.vna_other.get(endian),
                            Version {
                                library: file.clone(),
                                name: String::from_utf8_lossy(name).into_owned(),
                            },
                        );
                    }
                }
            }
        }

        trace!(
            "{} versym entries, {} versions",
            versions.versym.len(),
            versions.by_index.len()
        );
        Ok(versions)
    }

    /// (library, version) for the symbol at `index`, empty when unversioned
    fn lookup(&self, index: usize) -> (String, String) {
        let version = self
            .versym
            .get(index)
            .map(|v| v & VERSYM_INDEX_MASK)
            .filter(|&v| v >= FIRST_VERSION_INDEX)
            .and_then(|v| self.by_index.get(&v));
        match version {
            Some(version) => (version.library.clone(), version.name.clone()),
            None => (String::new(), String::new()),
        }
    }
}
