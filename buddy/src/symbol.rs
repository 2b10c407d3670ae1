use object::elf;
use serde::{Deserialize, Serialize};

use crate::demangle::DemangleMode;
use crate::elf::RawSymbol;

/// A symbol table entry prepared for display.
///
/// Field order is the JSON key order. The text table moves the two name
/// columns to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Symbol {
    pub name: String,
    pub name_version: String,
    pub binding: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub visibility: String,
    pub library: String,
    pub version: String,
    pub value: u64,
    pub size: u64,
}

impl Symbol {
    pub fn from_raw(raw: &RawSymbol, demangle: DemangleMode) -> Self {
        let (name, name_version) = split_version(&raw.name);
        Self {
            name: demangle.filter(name),
            name_version: name_version.to_owned(),
            binding: binding_name(raw.info >> 4),
            kind: type_name(raw.info & 0xf),
            visibility: visibility_name(raw.other & 0x3),
            library: raw.library.clone(),
            version: raw.version.clone(),
            value: raw.value,
            size: raw.size,
        }
    }
}

/// Splits `name@VERSION` or `name@@VERSION` at the first `@`. The
/// suffix keeps its `@` characters.
pub fn split_version(name: &str) -> (&str, &str) {
    match name.find('@') {
        Some(i) => name.split_at(i),
        None => (name, ""),
    }
}

const BINDINGS: &[(u8, &str)] = &[
    (elf::STB_LOCAL, "STB_LOCAL"),
    (elf::STB_GLOBAL, "STB_GLOBAL"),
    (elf::STB_WEAK, "STB_WEAK"),
    (elf::STB_LOOS, "STB_LOOS"),
    (elf::STB_HIOS, "STB_HIOS"),
    (elf::STB_LOPROC, "STB_LOPROC"),
    (elf::STB_HIPROC, "STB_HIPROC"),
];

const TYPES: &[(u8, &str)] = &[
    (elf::STT_NOTYPE, "STT_NOTYPE"),
    (elf::STT_OBJECT, "STT_OBJECT"),
    (elf::STT_FUNC, "STT_FUNC"),
    (elf::STT_SECTION, "STT_SECTION"),
    (elf::STT_FILE, "STT_FILE"),
    (elf::STT_COMMON, "STT_COMMON"),
    (elf::STT_TLS, "STT_TLS"),
    (elf::STT_LOOS, "STT_LOOS"),
    (elf::STT_HIOS, "STT_HIOS"),
    (elf::STT_LOPROC, "STT_LOPROC"),
    (elf::STT_HIPROC, "STT_HIPROC"),
];

const VISIBILITIES: &[(u8, &str)] = &[
    (elf::STV_DEFAULT, "STV_DEFAULT"),
    (elf::STV_INTERNAL, "STV_INTERNAL"),
    (elf::STV_HIDDEN, "STV_HIDDEN"),
    (elf::STV_PROTECTED, "STV_PROTECTED"),
];

pub fn binding_name(bind: u8) -> String {
    constant_name(BINDINGS, bind)
}

pub fn type_name(kind: u8) -> String {
    constant_name(TYPES, kind)
}

pub fn visibility_name(vis: u8) -> String {
    constant_name(VISIBILITIES, vis)
}

/// Exact name if `value` is listed, otherwise `NEAREST+offset` from the
/// closest smaller constant. `names` must be sorted by value.
fn constant_name(names: &[(u8, &str)], value: u8) -> String {
    if let Some((_, name)) = names.iter().find(|(v, _)| *v == value) {
        return (*name).to_owned();
    }
    match names.iter().rev().find(|(v, _)| *v < value) {
        Some((v, name)) => format!("{}+{}", name, value - v),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_glibc_version() {
        assert_eq!(split_version("foo@@GLIBC_2.2.5"), ("foo", "@@GLIBC_2.2.5"));
        assert_eq!(split_version("memcpy@GLIBC_2.14"), ("memcpy", "@GLIBC_2.14"));
        assert_eq!(split_version("foo"), ("foo", ""));
        assert_eq!(split_version(""), ("", ""));
        assert_eq!(split_version("@V1"), ("", "@V1"));
        // only the first @ splits
        assert_eq!(split_version("a@b@c"), ("a", "@b@c"));
    }

    #[test]
    fn classification_names() {
        assert_eq!(binding_name(elf::STB_GLOBAL), "STB_GLOBAL");
        assert_eq!(binding_name(elf::STB_WEAK), "STB_WEAK");
        assert_eq!(binding_name(11), "STB_LOOS+1");
        assert_eq!(binding_name(3), "STB_WEAK+1");
        assert_eq!(type_name(elf::STT_FUNC), "STT_FUNC");
        assert_eq!(type_name(elf::STT_GNU_IFUNC), "STT_LOOS");
        assert_eq!(type_name(14), "STT_LOPROC+1");
        assert_eq!(visibility_name(elf::STV_HIDDEN), "STV_HIDDEN");
    }

    #[test]
    fn from_raw() {
        let raw = RawSymbol {
            name: "_ZN3foo3barEi@@LIBFOO_1.0".to_owned(),
            info: (elf::STB_GLOBAL << 4) | elf::STT_FUNC,
            other: elf::STV_PROTECTED,
            library: String::new(),
            version: "LIBFOO_1.0".to_owned(),
            value: 0x1130,
            size: 42,
        };

        let sym = Symbol::from_raw(&raw, DemangleMode::Short);
        assert_eq!(sym.name, "foo::bar");
        assert_eq!(sym.name_version, "@@LIBFOO_1.0");
        assert_eq!(sym.binding, "STB_GLOBAL");
        assert_eq!(sym.kind, "STT_FUNC");
        assert_eq!(sym.visibility, "STV_PROTECTED");
        assert_eq!(sym.version, "LIBFOO_1.0");
        assert_eq!((sym.value, sym.size), (0x1130, 42));

        let sym = Symbol::from_raw(&raw, DemangleMode::None);
        assert_eq!(sym.name, "_ZN3foo3barEi");
    }

    #[test]
    fn json_field_names() {
        let sym = Symbol::from_raw(&RawSymbol::default(), DemangleMode::None);
        let value = serde_json::to_value(&sym).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["Binding", "Library", "Name", "NameVersion", "Size", "Type", "Value", "Version", "Visibility"]
        );
    }

    #[test]
    fn json_key_order() {
        let sym = Symbol::from_raw(&RawSymbol::default(), DemangleMode::None);
        let json = serde_json::to_string(&sym).unwrap();
        let keys = [
            "Name", "NameVersion", "Binding", "Type", "Visibility", "Library", "Version", "Value", "Size",
        ];
        let positions: Vec<_> = keys
            .iter()
            .map(|key| json.find(&format!("\"{key}\":")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }
}
