//! go-unalias: rewrite uses of Go alias declarations to their canonical symbols.
//!
//! Resolves the aliases of a reference package once, then walks a target
//! tree and rewrites `ref.Alias` references to `origin.Canonical`, adding the
//! origin package's import where a file lacks it.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Commands, ReferenceArgs, ScanArgs};
use colored::Colorize;
use go_unalias::{
    AliasMap, Diagnostics, FilePlan, ScanOptions, Substitution, UnaliasError, analyzer, resolver,
    rewriter, scanner,
};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Commands::Rewrite {
            target,
            reference,
            reference_path,
            scan,
            dry_run,
            interactive,
            json,
        } => cmd_rewrite(
            &target,
            &reference,
            reference_path,
            &scan,
            RewriteMode {
                dry_run,
                interactive,
                json,
            },
        ),
        Commands::Aliases { reference, json } => cmd_aliases(&reference, json),
        Commands::Scan { target, scan } => cmd_scan(&target, &scan),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            let code = err
                .downcast_ref::<UnaliasError>()
                .map(UnaliasError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Clone, Copy)]
struct RewriteMode {
    dry_run: bool,
    interactive: bool,
    json: bool,
}

fn cmd_rewrite(
    target: &Path,
    reference: &ReferenceArgs,
    reference_path: Option<String>,
    scan: &ScanArgs,
    mode: RewriteMode,
) -> Result<()> {
    let reference_path = match reference_path {
        Some(path) => path,
        None => resolver::infer_import_path(&reference.reference_dir)
            .context("Failed to infer the reference import path")?,
    };

    // The alias map is complete before any target file is looked at.
    let (_, aliases) = load_aliases(reference)?;
    if aliases.is_empty() && !mode.json {
        println!(
            "{} No aliases found in {}",
            "info:".blue().bold(),
            reference.reference_dir.display()
        );
    }

    let options = ScanOptions::new(&scan.exclude, !scan.no_default_excludes)?;
    let paths = scanner::collect_go_files(&[target.to_path_buf()], &options)?;
    let files = scanner::parse_files(&paths).context("Failed to parse target tree")?;
    tracing::info!(
        files = files.len(),
        aliases = aliases.len(),
        reference = %reference_path,
        "rewriting target tree"
    );

    let mut diagnostics = Diagnostics {
        aliases: aliases.len(),
        ..Diagnostics::default()
    };

    for file in &files {
        let plan = analyzer::analyze_file(file, &aliases, &reference_path);
        diagnostics.record(&plan);
        if !plan.is_dirty() {
            continue;
        }

        if !mode.json {
            print_plan(&plan, mode.dry_run);
        }
        if mode.dry_run {
            continue;
        }
        if mode.interactive && !confirm(&plan.path)? {
            println!("  {}", "skipped".dimmed());
            continue;
        }

        rewriter::apply(file, &plan)
            .with_context(|| format!("Failed to rewrite {}", plan.path.display()))?;
        diagnostics.files_written += 1;
    }

    if mode.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        print_summary(&diagnostics, mode.dry_run);
    }

    Ok(())
}

fn cmd_aliases(reference: &ReferenceArgs, json: bool) -> Result<()> {
    let (package, aliases) = load_aliases(reference)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&aliases)?);
        return Ok(());
    }

    if aliases.is_empty() {
        println!("{} No aliases found in package {}", "info:".blue().bold(), package);
    } else {
        resolver::print_table(&aliases);
        println!(
            "\n{} {} alias(es) in package {}",
            "info:".blue().bold(),
            aliases.len(),
            package
        );
    }
    Ok(())
}

fn cmd_scan(target: &Path, scan: &ScanArgs) -> Result<()> {
    let options = ScanOptions::new(&scan.exclude, !scan.no_default_excludes)?;
    let files = scanner::collect_go_files(&[target.to_path_buf()], &options)?;

    println!("Would scan {} files:", files.len());
    for file in files {
        println!("  {}", file.display());
    }

    Ok(())
}

/// Parses the reference package and resolves its aliases.
fn load_aliases(reference: &ReferenceArgs) -> Result<(String, AliasMap)> {
    let package = resolver::load_package(
        &reference.reference_dir,
        reference.reference_package.as_deref(),
    )
    .with_context(|| {
        format!(
            "Failed to load reference package from {}",
            reference.reference_dir.display()
        )
    })?;
    let aliases = resolver::resolve(&package.files, reference.export_filter)
        .context("Failed to resolve aliases")?;
    Ok((package.name, aliases))
}

/// Prints one audit line per substitution plus the imports to be added.
fn print_plan(plan: &FilePlan, dry_run: bool) {
    let verb = if dry_run { "would edit" } else { "editing" };
    for sub in &plan.substitutions {
        tracing::info!(
            file = %plan.path.display(),
            line = sub.reference.line,
            from = %sub.reference,
            to = %sub.replacement(),
            "substituting alias"
        );
        println!("{}", audit_line(plan, sub, verb));
    }
    for (path, alias) in &plan.pending_imports {
        println!(
            "  {} import {} {}",
            "+".green().bold(),
            alias,
            format!("{:?}", path).green()
        );
    }
}

/// `editing <package> <file>:<line>:<col>: replacing ref.Alias, with origin.Canonical (path)`
fn audit_line(plan: &FilePlan, sub: &Substitution, verb: &str) -> String {
    format!(
        "{} {} {}:{}:{}: replacing {}, with {} {}",
        verb.yellow().bold(),
        plan.package,
        plan.path.display(),
        sub.reference.line,
        sub.reference.column,
        sub.reference.to_string().red(),
        sub.replacement().green(),
        format!("({})", sub.entry.origin_module_path).dimmed()
    )
}

fn print_summary(d: &Diagnostics, dry_run: bool) {
    if d.files_changed == 0 {
        println!(
            "{} No alias references found in {} file(s)",
            "ok:".green().bold(),
            d.files_scanned
        );
        return;
    }

    println!(
        "\n{} {} reference(s) in {} of {} file(s), {} import(s) added",
        if dry_run { "Would rewrite" } else { "Rewrote" }.bold(),
        d.substitutions,
        d.files_changed,
        d.files_scanned,
        d.imports_added
    );
    if !dry_run && d.files_written < d.files_changed {
        println!(
            "{} {} file(s) left unchanged",
            "info:".blue().bold(),
            d.files_changed - d.files_written
        );
    }
    if dry_run {
        println!("\n{} Run without --dry-run to apply changes", "hint:".cyan().bold());
    }
}

fn confirm(path: &Path) -> Result<bool> {
    let answer = dialoguer::Confirm::new()
        .with_prompt(format!("Rewrite {}?", path.display()))
        .default(true)
        .interact()?;
    Ok(answer)
}
