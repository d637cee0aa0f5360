use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use tabledump_engine::DumpConfig;
use tabledump_source_sqlite::SqliteSourceConfig;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "tabledump", about = "Dump a database as re-importable SQL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export every table into one SQL file
    Dump(DumpArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct DumpArgs {
    /// Path to TOML config file
    #[arg(long, env = "TABLEDUMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides `[source] path`)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Directory the dump file is written to
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Dump file name, without the `.sql` extension
    #[arg(long)]
    pub name: Option<String>,

    /// Byte budget for one INSERT statement
    #[arg(long)]
    pub max_allowed_packet: Option<usize>,

    /// Character set stamped into the dump
    #[arg(long)]
    pub charset: Option<String>,

    /// Table to leave out (repeatable)
    #[arg(long = "ignore-table")]
    pub ignore_tables: Vec<String>,

    /// Write the dump to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub source: Option<SqliteSourceConfig>,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub name: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Config {
            context: "read",
            detail: format!("'{}': {e}", path.display()),
        })?;
        Self::parse(&content).map_err(|e| match e {
            CliError::Config { context, detail } => CliError::Config {
                context,
                detail: format!("'{}': {detail}", path.display()),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|e| CliError::Config {
            context: "parse",
            detail: e.to_string(),
        })
    }
}

// ---- Resolved plan ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File { dir: PathBuf, name: String },
}

/// Everything one dump run needs, after merging file config and flags.
#[derive(Debug)]
pub struct Plan {
    pub source: SqliteSourceConfig,
    pub dump: DumpConfig,
    pub output: Output,
}

impl DumpArgs {
    pub fn resolve(&self) -> Result<Plan, CliError> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        self.merge(file)
    }

    /// Flags override file values.
    fn merge(&self, file: FileConfig) -> Result<Plan, CliError> {
        let source = match (&self.database, file.source) {
            (Some(path), Some(mut cfg)) => {
                cfg.path = path.clone();
                cfg
            }
            (Some(path), None) => SqliteSourceConfig::new(path),
            (None, Some(cfg)) => cfg,
            (None, None) => {
                return Err(CliError::Config {
                    context: "source",
                    detail: "no database given (use --database or [source] path)".into(),
                });
            }
        };

        let mut dump = file.dump;
        if let Some(n) = self.max_allowed_packet {
            dump.max_allowed_packet = n;
        }
        if let Some(cs) = &self.charset {
            dump.charset = cs.clone();
        }
        dump.ignore_tables.extend(self.ignore_tables.iter().cloned());

        let output = if self.stdout {
            Output::Stdout
        } else {
            let dir = self
                .out_dir
                .clone()
                .or(file.output.dir)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = match self.name.clone().or(file.output.name) {
                Some(n) => n,
                None => source
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| CliError::Config {
                        context: "output",
                        detail: "cannot derive dump name from database path (use --name)".into(),
                    })?,
            };
            Output::File { dir, name }
        };

        Ok(Plan {
            source,
            dump,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DumpArgs {
        DumpArgs::default()
    }

    #[test]
    fn flags_only() {
        let a = DumpArgs {
            database: Some("data/shop.db".into()),
            ..args()
        };
        let plan = a.merge(FileConfig::default()).unwrap();
        assert_eq!(plan.source.path, PathBuf::from("data/shop.db"));
        assert_eq!(plan.source.page_size, 1000);
        assert_eq!(plan.dump, DumpConfig::default());
        assert_eq!(
            plan.output,
            Output::File {
                dir: ".".into(),
                name: "shop".into()
            }
        );
    }

    #[test]
    fn file_config_with_overrides() {
        let file = FileConfig::parse(
            r#"
            [source]
            path = "app.db"
            page_size = 50

            [dump]
            max_allowed_packet = 2048
            ignore_tables = ["sessions"]

            [output]
            dir = "/var/backups"
            name = "nightly"
            "#,
        )
        .unwrap();
        let a = DumpArgs {
            max_allowed_packet: Some(4096),
            ignore_tables: vec!["cache".into()],
            charset: Some("utf8mb4".into()),
            ..args()
        };
        let plan = a.merge(file).unwrap();
        assert_eq!(plan.source.page_size, 50);
        assert_eq!(plan.dump.max_allowed_packet, 4096);
        assert_eq!(plan.dump.charset, "utf8mb4");
        assert_eq!(plan.dump.ignore_tables, vec!["sessions", "cache"]);
        assert_eq!(
            plan.output,
            Output::File {
                dir: "/var/backups".into(),
                name: "nightly".into()
            }
        );
    }

    #[test]
    fn database_flag_overrides_file_path_but_keeps_page_size() {
        let file = FileConfig::parse("[source]\npath = \"a.db\"\npage_size = 7\n").unwrap();
        let a = DumpArgs {
            database: Some("b.db".into()),
            stdout: true,
            ..args()
        };
        let plan = a.merge(file).unwrap();
        assert_eq!(plan.source.path, PathBuf::from("b.db"));
        assert_eq!(plan.source.page_size, 7);
        assert_eq!(plan.output, Output::Stdout);
    }

    #[test]
    fn missing_database_is_config_error() {
        let err = args().merge(FileConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::Config { context: "source", .. }));
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            FileConfig::parse("[dump]\nmax_allowed_packet = \"big\"\n"),
            Err(CliError::Config { context: "parse", .. })
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.toml");
        std::fs::write(&path, "[source]\npath = \"x.db\"\n").unwrap();
        let cfg = FileConfig::load(&path).unwrap();
        assert_eq!(cfg.source.unwrap().path, PathBuf::from("x.db"));

        let err = FileConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config { context: "read", .. }));
    }

    #[test]
    fn cli_parses_dump_subcommand() {
        let cli = Cli::try_parse_from([
            "tabledump",
            "dump",
            "--database",
            "a.db",
            "--ignore-table",
            "x",
            "--ignore-table",
            "y",
            "--stdout",
        ])
        .unwrap();
        let Commands::Dump(a) = cli.command;
        assert_eq!(a.ignore_tables, vec!["x", "y"]);
        assert!(a.stdout);
    }
}
