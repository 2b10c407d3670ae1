use anyhow::{Context, Result};
use std::{fs::File, io::Read, path::{Path, PathBuf}};

use serde::Deserialize;

use crate::args::SymsArgs;
use crate::demangle::DemangleMode;
use crate::elf::SymbolTable;
use crate::render::{OutputFormat, OutputTarget};

/// Defaults loaded from `--config`, e.g.
///
/// ```toml
/// [syms]
/// demangle = "full"
/// table = "dynsym"
/// json = true
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct BuddyConfig {
    #[serde(default)]
    pub syms: SymsConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct SymsConfig {
    pub demangle: Option<String>,
    pub table: Option<String>,
    pub output: Option<PathBuf>,
    pub json: Option<bool>,
}

impl BuddyConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut config_file = File::open(path)
            .with_context(|| format!("config file {} not found", path.display()))?;
        let mut contents = String::new();
        config_file
            .read_to_string(&mut contents)
            .with_context(|| format!("something went wrong reading {}", path.display()))?;
        let config: BuddyConfig = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}

/// Validated options for the `syms` command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymsOptions {
    pub demangle: DemangleMode,
    pub table: SymbolTable,
    pub output: OutputTarget,
    pub format: OutputFormat,
}

impl SymsOptions {
    /// Command line flags win over the config file, which wins over the
    /// built-in defaults. Touches no files.
    pub fn resolve(args: &SymsArgs, config: &SymsConfig) -> crate::Result<Self> {
        let demangle = match args.demangle.as_ref().or(config.demangle.as_ref()) {
            Some(mode) => mode.parse()?,
            None => DemangleMode::default(),
        };
        let table = match args.table.as_ref().or(config.table.as_ref()) {
            Some(table) => table.parse()?,
            None => SymbolTable::default(),
        };
        let output = match args.output.as_ref().or(config.output.as_ref()) {
            Some(path) => OutputTarget::File(path.clone()),
            None => OutputTarget::Stdout,
        };
        let json = match (args.json, args.no_json) {
            (true, _) => true,
            (_, true) => false,
            _ => config.json.unwrap_or(false),
        };
        let format = if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        };

        Ok(Self {
            demangle,
            table,
            output,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn defaults() {
        let options = SymsOptions::resolve(&SymsArgs::default(), &SymsConfig::default()).unwrap();
        assert_eq!(options, SymsOptions::default());
        assert_eq!(options.demangle, DemangleMode::Short);
        assert_eq!(options.table, SymbolTable::Symtab);
        assert_eq!(options.output, OutputTarget::Stdout);
        assert_eq!(options.format, OutputFormat::Text);
    }

    #[test]
    fn flags_override_config() {
        let args = SymsArgs {
            demangle: Some("none".to_owned()),
            ..Default::default()
        };
        let config = SymsConfig {
            demangle: Some("full".to_owned()),
            table: Some("dynsym".to_owned()),
            output: Some(PathBuf::from("syms.json")),
            json: Some(true),
        };
        let options = SymsOptions::resolve(&args, &config).unwrap();
        assert_eq!(options.demangle, DemangleMode::None);
        assert_eq!(options.table, SymbolTable::Dynsym);
        assert_eq!(options.output, OutputTarget::File(PathBuf::from("syms.json")));
        assert_eq!(options.format, OutputFormat::Json);
    }

    #[test]
    fn no_json_overrides_config() {
        let config = SymsConfig {
            json: Some(true),
            ..Default::default()
        };
        let args = SymsArgs {
            no_json: true,
            ..Default::default()
        };
        let options = SymsOptions::resolve(&args, &config).unwrap();
        assert_eq!(options.format, OutputFormat::Text);

        let options = SymsOptions::resolve(&SymsArgs::default(), &config).unwrap();
        assert_eq!(options.format, OutputFormat::Json);
    }

    #[test]
    fn invalid_values() {
        let args = SymsArgs {
            table: Some("both".to_owned()),
            ..Default::default()
        };
        let err = SymsOptions::resolve(&args, &SymsConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "unknown value for --table: both");

        let config = SymsConfig {
            demangle: Some("pretty".to_owned()),
            ..Default::default()
        };
        let err = SymsOptions::resolve(&SymsArgs::default(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "unknown value for --demangle: pretty");
    }

    #[test]
    fn load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[syms]\ndemangle = \"full\"\njson = true").unwrap();

        let config = BuddyConfig::from_path(file.path()).unwrap();
        assert_eq!(config.syms.demangle.as_deref(), Some("full"));
        assert_eq!(config.syms.json, Some(true));
        assert_eq!(config.syms.table, None);
    }

    #[test]
    fn bad_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[syms]\ncolour = true").unwrap();
        assert!(BuddyConfig::from_path(file.path()).is_err());
        assert!(BuddyConfig::from_path(Path::new("/nonexistent/buddy.toml")).is_err());
    }
}
