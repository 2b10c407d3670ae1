//! Builds small ELF images with known contents for tests.
//!
//! Only the pieces read back by `buddy` are emitted: section headers,
//! `.dynamic` with `DT_NEEDED` entries, `.symtab`, `.dynsym` and the GNU
//! symbol versioning sections. There are no program headers or code.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use object::elf;
use object::write::elf::{FileHeader, Sym, Verdef, Vernaux, Verneed, Writer};
use object::write::StringId;
use object::Endianness;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestVersion {
    /// Required from another file, like `puts@GLIBC_2.2.5` from `libc.so.6`
    Needed { library: String, name: String },
    /// Defined by the file itself
    Defined(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSymbol {
    pub name: String,
    pub bind: u8,
    pub kind: u8,
    pub visibility: u8,
    pub value: u64,
    pub size: u64,
    pub version: Option<TestVersion>,
    pub hidden: bool,
}

impl TestSymbol {
    fn new(name: &str, kind: u8) -> Self {
        Self {
            name: name.to_owned(),
            bind: elf::STB_GLOBAL,
            kind,
            visibility: elf::STV_DEFAULT,
            value: 0,
            size: 0,
            version: None,
            hidden: false,
        }
    }

    pub fn func(name: &str) -> Self {
        Self::new(name, elf::STT_FUNC)
    }

    pub fn object(name: &str) -> Self {
        Self::new(name, elf::STT_OBJECT)
    }

    pub fn notype(name: &str) -> Self {
        Self::new(name, elf::STT_NOTYPE)
    }

    pub fn local(mut self) -> Self {
        self.bind = elf::STB_LOCAL;
        self
    }

    pub fn weak(mut self) -> Self {
        self.bind = elf::STB_WEAK;
        self
    }

    pub fn visibility(mut self, visibility: u8) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn at(mut self, value: u64, size: u64) -> Self {
        self.value = value;
        self.size = size;
        self
    }

    pub fn needs(mut self, library: &str, version: &str) -> Self {
        self.version = Some(TestVersion::Needed {
            library: library.to_owned(),
            name: version.to_owned(),
        });
        self
    }

    pub fn defines(mut self, version: &str) -> Self {
        self.version = Some(TestVersion::Defined(version.to_owned()));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    fn shndx(&self) -> u16 {
        match self.version {
            Some(TestVersion::Needed { .. }) => elf::SHN_UNDEF,
            _ => elf::SHN_ABS,
        }
    }

    fn st_info(&self) -> u8 {
        (self.bind << 4) | (self.kind & 0xf)
    }
}

#[derive(Debug, Clone)]
pub struct ElfBuilder {
    is_64: bool,
    endian: Endianness,
    soname: String,
    needed: Vec<String>,
    symtab: Option<Vec<TestSymbol>>,
    dynsym: Option<Vec<TestSymbol>>,
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ElfBuilder {
    /// A 64-bit little-endian image
    pub fn new() -> Self {
        Self {
            is_64: true,
            endian: Endianness::Little,
            soname: "libtest.so.1".to_owned(),
            needed: Vec::new(),
            symtab: None,
            dynsym: None,
        }
    }

    pub fn elf32(mut self) -> Self {
        self.is_64 = false;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.endian = Endianness::Big;
        self
    }

    pub fn needed(mut self, library: &str) -> Self {
        self.needed.push(library.to_owned());
        self
    }

    pub fn symtab(mut self, symbols: Vec<TestSymbol>) -> Self {
        self.symtab = Some(symbols);
        self
    }

    pub fn dynsym(mut self, symbols: Vec<TestSymbol>) -> Self {
        self.dynsym = Some(symbols);
        self
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let data = self
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let path = dir.join(name);
        fs::write(&path, data)?;
        Ok(path)
    }

    fn machine(&self) -> u16 {
        match (self.endian, self.is_64) {
            (Endianness::Little, true) => elf::EM_X86_64,
            (Endianness::Little, false) => elf::EM_386,
            (Endianness::Big, true) => elf::EM_PPC64,
            (Endianness::Big, false) => elf::EM_PPC,
        }
    }

    pub fn build(&self) -> object::write::Result<Vec<u8>> {
        let dynsym = self.dynsym.as_deref();
        let symtab = self.symtab.as_deref();
        let has_dynamic = !self.needed.is_empty() || dynsym.is_some();
        let versions = VersionPlan::new(dynsym.unwrap_or_default());

        let mut buffer = Vec::new();
        let mut writer = Writer::new(self.endian, self.is_64, &mut buffer);

        // strings
        let needed: Vec<StringId> = self
            .needed
            .iter()
            .map(|lib| writer.add_dynamic_string(lib.as_bytes()))
            .collect();
        let dynsym_names: Vec<StringId> = dynsym
            .unwrap_or_default()
            .iter()
            .map(|sym| writer.add_dynamic_string(sym.name.as_bytes()))
            .collect();
        let soname = writer.add_dynamic_string(self.soname.as_bytes());
        let defined: Vec<StringId> = versions
            .defined
            .iter()
            .map(|name| writer.add_dynamic_string(name.as_bytes()))
            .collect();
        let verneeds: Vec<(StringId, Vec<StringId>)> = versions
            .needed
            .iter()
            .map(|(library, names)| {
                let file = writer.add_dynamic_string(library.as_bytes());
                let names = names
                    .iter()
                    .map(|name| writer.add_dynamic_string(name.as_bytes()))
                    .collect();
                (file, names)
            })
            .collect();
        let symtab_names: Vec<StringId> = symtab
            .unwrap_or_default()
            .iter()
            .map(|sym| writer.add_string(sym.name.as_bytes()))
            .collect();

        // symbol and section indices, in section header order
        if let Some(symbols) = dynsym {
            writer.reserve_null_dynamic_symbol_index();
            for _ in symbols {
                writer.reserve_dynamic_symbol_index();
            }
        }
        if let Some(symbols) = symtab {
            writer.reserve_null_symbol_index();
            for _ in symbols {
                writer.reserve_symbol_index(None);
            }
        }
        writer.reserve_null_section_index();
        if has_dynamic {
            writer.reserve_dynstr_section_index();
            writer.reserve_dynamic_section_index();
        }
        if dynsym.is_some() {
            writer.reserve_dynsym_section_index();
        }
        if versions.any() {
            writer.reserve_gnu_versym_section_index();
        }
        if !versions.defined.is_empty() {
            writer.reserve_gnu_verdef_section_index();
        }
        if !versions.needed.is_empty() {
            writer.reserve_gnu_verneed_section_index();
        }
        if symtab.is_some() {
            writer.reserve_strtab_section_index();
            writer.reserve_symtab_section_index();
        }
        writer.reserve_shstrtab_section_index();

        // file layout
        writer.reserve_file_header();
        if has_dynamic {
            writer.reserve_dynstr();
            writer.reserve_dynamic(needed.len() + 1);
        }
        writer.reserve_dynsym();
        if versions.any() {
            writer.reserve_gnu_versym();
        }
        let verdef_count = versions.defined.len() + 1;
        if !versions.defined.is_empty() {
            writer.reserve_gnu_verdef(verdef_count, verdef_count);
        }
        let vernaux_count = versions.needed.iter().map(|(_, names)| names.len()).sum();
        writer.reserve_gnu_verneed(versions.needed.len(), vernaux_count);
        writer.reserve_strtab();
        writer.reserve_symtab();
        writer.reserve_shstrtab();
        writer.reserve_section_headers();

        writer.write_file_header(&FileHeader {
            os_abi: elf::ELFOSABI_NONE,
            abi_version: 0,
            e_type: elf::ET_DYN,
            e_machine: self.machine(),
            e_entry: 0,
            e_flags: 0,
        })?;

        if has_dynamic {
            writer.write_dynstr();
            writer.write_align_dynamic();
            for lib in &needed {
                writer.write_dynamic_string(elf::DT_NEEDED, *lib);
            }
            writer.write_dynamic(elf::DT_NULL, 0);
        }

        if let Some(symbols) = dynsym {
            writer.write_null_dynamic_symbol();
            for (sym, name) in symbols.iter().zip(&dynsym_names) {
                writer.write_dynamic_symbol(&Sym {
                    name: Some(*name),
                    section: None,
                    st_info: sym.st_info(),
                    st_other: sym.visibility,
                    st_shndx: sym.shndx(),
                    st_value: sym.value,
                    st_size: sym.size,
                });
            }
            if versions.any() {
                writer.write_null_gnu_versym();
                for sym in symbols {
                    writer.write_gnu_versym(versions.versym(sym));
                }
            }
        }

        if !versions.defined.is_empty() {
            writer.write_align_gnu_verdef();
            let base = std::iter::once((elf::VER_FLG_BASE, soname));
            let rest = defined.iter().map(|name| (0, *name));
            for (i, (flags, name)) in base.chain(rest).enumerate() {
                writer.write_gnu_verdef(&Verdef {
                    version: elf::VER_DEF_CURRENT,
                    flags,
                    index: i as u16 + 1,
                    aux_count: 1,
                    name,
                });
            }
        }

        if !verneeds.is_empty() {
            writer.write_align_gnu_verneed();
            let mut index = versions.first_needed();
            for (file, names) in &verneeds {
                writer.write_gnu_verneed(&Verneed {
                    version: elf::VER_NEED_CURRENT,
                    aux_count: names.len() as u16,
                    file: *file,
                });
                for name in names {
                    writer.write_gnu_vernaux(&Vernaux {
                        flags: 0,
                        index,
                        name: *name,
                    });
                    index += 1;
                }
            }
        }

        let mut num_local = 0;
        if let Some(symbols) = symtab {
            writer.write_strtab();
            writer.write_null_symbol();
            for (sym, name) in symbols.iter().zip(&symtab_names) {
                writer.write_symbol(&Sym {
                    name: Some(*name),
                    section: None,
                    st_info: sym.st_info(),
                    st_other: sym.visibility,
                    st_shndx: sym.shndx(),
                    st_value: sym.value,
                    st_size: sym.size,
                });
            }
            num_local = 1 + symbols.iter().take_while(|s| s.bind == elf::STB_LOCAL).count() as u32;
        }

        writer.write_shstrtab();

        writer.write_null_section_header();
        writer.write_dynstr_section_header(0);
        writer.write_dynamic_section_header(0);
        writer.write_dynsym_section_header(0, 1);
        writer.write_gnu_versym_section_header(0);
        writer.write_gnu_verdef_section_header(0);
        writer.write_gnu_verneed_section_header(0);
        writer.write_strtab_section_header();
        writer.write_symtab_section_header(num_local);
        writer.write_shstrtab_section_header();

        debug_assert_eq!(writer.reserved_len(), writer.len());
        Ok(buffer)
    }
}

/// Version indices: 1 is the file itself, defined versions follow, then
/// the needed ones grouped by library.
#[derive(Default)]
struct VersionPlan {
    defined: Vec<String>,
    needed: Vec<(String, Vec<String>)>,
}

impl VersionPlan {
    fn new(symbols: &[TestSymbol]) -> Self {
        let mut plan = VersionPlan::default();
        for sym in symbols {
            match &sym.version {
                Some(TestVersion::Defined(name)) => {
                    if !plan.defined.contains(name) {
                        plan.defined.push(name.clone());
                    }
                }
                Some(TestVersion::Needed { library, name }) => {
                    match plan.needed.iter_mut().find(|(lib, _)| lib == library) {
                        Some((_, names)) => {
                            if !names.contains(name) {
                                names.push(name.clone());
                            }
                        }
                        None => plan.needed.push((library.clone(), vec![name.clone()])),
                    }
                }
                None => {}
            }
        }
        plan
    }

    fn any(&self) -> bool {
        !self.defined.is_empty() || !self.needed.is_empty()
    }

    fn first_needed(&self) -> u16 {
        self.defined.len() as u16 + 2
    }

    fn index(&self, version: &TestVersion) -> u16 {
        match version {
            TestVersion::Defined(name) => {
                2 + self.defined.iter().position(|d| d == name).unwrap_or_default() as u16
            }
            TestVersion::Needed { library, name } => {
                let mut index = self.first_needed();
                for (lib, names) in &self.needed {
                    if lib == library {
                        index += names.iter().position(|n| n == name).unwrap_or_default() as u16;
                        break;
                    }
                    index += names.len() as u16;
                }
                index
            }
        }
    }

    /// `.gnu.version` entry for `sym`
    fn versym(&self, sym: &TestSymbol) -> u16 {
        let index = match &sym.version {
            Some(version) => self.index(version),
            None if sym.bind == elf::STB_LOCAL => elf::VER_NDX_LOCAL,
            None => elf::VER_NDX_GLOBAL,
        };
        if sym.hidden {
            index | elf::VERSYM_HIDDEN
        } else {
            index
        }
    }
}

#[cfg(test)]
mod tests {
    use object::elf::{FileHeader32, FileHeader64};
    use object::read::elf::FileHeader as _;

    use super::*;

    #[test]
    fn header_fields() {
        let data = ElfBuilder::new().needed("libc.so.6").build().unwrap();
        let header = FileHeader64::<Endianness>::parse(&*data).unwrap();
        let endian = header.endian().unwrap();
        assert_eq!(endian, Endianness::Little);
        // null, .dynstr, .dynamic, .shstrtab
        assert_eq!(header.e_shnum.get(endian), 4);

        let data = ElfBuilder::new().elf32().big_endian().build().unwrap();
        assert_eq!(data[4], elf::ELFCLASS32);
        assert_eq!(data[5], elf::ELFDATA2MSB);
        let header = FileHeader32::<Endianness>::parse(&*data).unwrap();
        let endian = header.endian().unwrap();
        // null and .shstrtab
        assert_eq!(header.e_shnum.get(endian), 2);
        assert_eq!(header.e_machine.get(endian), elf::EM_PPC);
    }

    #[test]
    fn version_indices() {
        let symbols = vec![
            TestSymbol::func("puts").needs("libc.so.6", "GLIBC_2.2.5"),
            TestSymbol::func("api").defines("LIBTEST_1.0").hidden(),
            TestSymbol::func("cos").needs("libm.so.6", "GLIBC_2.2.5"),
            TestSymbol::func("memcpy").needs("libc.so.6", "GLIBC_2.14"),
            TestSymbol::object("plain"),
        ];
        let plan = VersionPlan::new(&symbols);
        let versym: Vec<_> = symbols.iter().map(|sym| plan.versym(sym)).collect();
        assert_eq!(versym, [3, 0x8002, 5, 4, elf::VER_NDX_GLOBAL]);
    }
}
