//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: rewriting a target
//! tree, inspecting the resolved aliases, or listing scan targets.

use clap::{Args as ClapArgs, Parser, Subcommand};
use go_unalias::ExportFilter;
use std::path::PathBuf;

/// Rewrite uses of Go alias declarations to their canonical symbols.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Log debug diagnostics to stderr. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the aliases come from.
#[derive(Debug, ClapArgs)]
pub struct ReferenceArgs {
    /// Directory of the package whose aliases are resolved.
    #[arg(long)]
    pub reference_dir: PathBuf,

    /// Package clause name to read from the reference directory.
    /// Defaults to the single non-test package found there.
    #[arg(long)]
    pub reference_package: Option<String>,

    /// Which alias candidates must be exported names.
    #[arg(long, value_enum, default_value_t = ExportFilter::Types)]
    pub export_filter: ExportFilter,
}

/// Which files are visited.
#[derive(Debug, ClapArgs)]
pub struct ScanArgs {
    /// Glob patterns for directories/files to exclude (e.g., "*_gen.go", "internal/legacy").
    /// By default, entries starting with `.` or `_`, `testdata` and `vendor` are excluded.
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Disable default exclusion of `.`/`_` prefixed entries, `testdata` and `vendor`.
    #[arg(long)]
    pub no_default_excludes: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rewrite alias references in a directory tree in place.
    Rewrite {
        /// Root of the tree to rewrite.
        target: PathBuf,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Import path of the reference package whose qualified accesses are replaced.
        /// Inferred from the nearest go.mod above the reference directory when omitted.
        #[arg(long)]
        reference_path: Option<String>,

        #[command(flatten)]
        scan: ScanArgs,

        /// Print the substitutions without writing any file.
        #[arg(long, conflicts_with = "interactive")]
        dry_run: bool,

        /// Interactively confirm each file's changes before writing.
        #[arg(short, long)]
        interactive: bool,

        /// Emit a JSON summary instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved alias table of the reference package.
    Aliases {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List files that would be rewritten without parsing them.
    Scan {
        /// Root of the tree to scan.
        target: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_rewrite_with_single_positional_target() {
        let args = Args::parse_from([
            "go-unalias",
            "rewrite",
            "./cmd",
            "--reference-dir",
            "./api/types",
            "--reference-path",
            "example.com/api/types",
            "-e",
            "*_gen.go",
        ]);
        match args.command {
            Commands::Rewrite {
                target,
                reference,
                reference_path,
                scan,
                dry_run,
                ..
            } => {
                assert_eq!(target, PathBuf::from("./cmd"));
                assert_eq!(reference.reference_dir, PathBuf::from("./api/types"));
                assert_eq!(reference.export_filter, ExportFilter::Types);
                assert_eq!(reference_path.as_deref(), Some("example.com/api/types"));
                assert_eq!(scan.exclude, vec!["*_gen.go"]);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn export_filter_accepts_all_variants() {
        for (flag, expected) in [
            ("types", ExportFilter::Types),
            ("all", ExportFilter::All),
            ("none", ExportFilter::None),
        ] {
            let args = Args::parse_from([
                "go-unalias",
                "aliases",
                "--reference-dir",
                "types",
                "--export-filter",
                flag,
            ]);
            match args.command {
                Commands::Aliases { reference, .. } => assert_eq!(reference.export_filter, expected),
                other => panic!("unexpected command: {other:?}"),
            }
        }
    }

    #[test]
    fn dry_run_conflicts_with_interactive() {
        let result = Args::try_parse_from([
            "go-unalias",
            "rewrite",
            ".",
            "--reference-dir",
            "types",
            "--dry-run",
            "--interactive",
        ]);
        assert!(result.is_err());
    }
}
