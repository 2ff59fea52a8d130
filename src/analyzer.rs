//! Per-file rewrite planning.
//!
//! Works in two sub-passes over an immutable parsed file: first all import
//! specs are read into the file's import table, then every qualified
//! reference through the reference package's local name is looked up in the
//! alias map. The output is a [`FilePlan`]; nothing is edited here.

use crate::resolver::{AliasEntry, AliasMap};
use crate::scanner::{self, GoFile, QualifiedRef};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// One qualified reference to rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub reference: QualifiedRef,
    pub entry: AliasEntry,
    /// Qualifier to write: the file's existing name for the origin package,
    /// or the origin alias when the import is added.
    pub qualifier: String,
}

impl Substitution {
    pub fn replacement(&self) -> String {
        format!("{}.{}", self.qualifier, self.entry.canonical_name)
    }
}

/// Everything needed to rewrite one file.
#[derive(Debug, Clone, Default)]
pub struct FilePlan {
    pub path: PathBuf,
    pub package: String,
    /// Local name of the reference package, if the file imports it.
    pub reference_alias: Option<String>,
    pub substitutions: Vec<Substitution>,
    /// Import path to the alias to introduce for it.
    pub pending_imports: BTreeMap<String, String>,
}

impl FilePlan {
    /// True once any reference is rewritten; only dirty files are written.
    pub fn is_dirty(&self) -> bool {
        !self.substitutions.is_empty()
    }
}

/// Summary statistics from a rewrite run.
#[derive(Debug, Default, Serialize)]
pub struct Diagnostics {
    pub aliases: usize,
    pub files_scanned: usize,
    pub files_importing_reference: usize,
    pub files_changed: usize,
    /// Dirty files actually written; lower than `files_changed` on dry runs or declined prompts.
    pub files_written: usize,
    pub substitutions: usize,
    pub imports_added: usize,
}

impl Diagnostics {
    pub fn record(&mut self, plan: &FilePlan) {
        self.files_scanned += 1;
        if plan.reference_alias.is_some() {
            self.files_importing_reference += 1;
        }
        if plan.is_dirty() {
            self.files_changed += 1;
        }
        self.substitutions += plan.substitutions.len();
        self.imports_added += plan.pending_imports.len();
    }
}

/// Plans the rewrite of `file` against a frozen alias map.
///
/// `reference_path` is the import path whose qualified accesses are replaced.
pub fn analyze_file(file: &GoFile, aliases: &AliasMap, reference_path: &str) -> FilePlan {
    let mut plan = FilePlan {
        path: file.path.clone(),
        package: file.package.clone(),
        ..FilePlan::default()
    };

    // Import path -> local name, and local name -> import path.
    let mut import_table: HashMap<String, String> = HashMap::new();
    let mut bound_names: HashMap<String, String> = HashMap::new();
    for spec in scanner::imports(file) {
        let Some(local) = spec.local_name() else {
            continue;
        };
        if spec.path == reference_path {
            plan.reference_alias = Some(local.to_string());
        }
        bound_names.insert(local.to_string(), spec.path.clone());
        import_table.insert(spec.path.clone(), local.to_string());
    }

    let Some(reference_alias) = plan.reference_alias.clone() else {
        tracing::debug!(file = %file.path.display(), "reference package not imported");
        return plan;
    };

    for reference in scanner::qualified_refs(file) {
        if reference.qualifier != reference_alias {
            continue;
        }
        let Some(entry) = aliases.get(&reference.member) else {
            continue;
        };

        let path = &entry.origin_module_path;
        let qualifier = match import_table
            .get(path)
            .or_else(|| plan.pending_imports.get(path))
        {
            Some(existing) => existing.clone(),
            None => {
                let alias = entry.origin_module_alias.clone();
                if let Some(other) = bound_names.get(&alias) {
                    if other != path {
                        tracing::warn!(
                            file = %file.path.display(),
                            alias = %alias,
                            existing = %other,
                            added = %path,
                            "added import name collides with an existing import"
                        );
                    }
                }
                plan.pending_imports.insert(path.clone(), alias.clone());
                alias
            }
        };

        plan.substitutions.push(Substitution {
            reference,
            entry: entry.clone(),
            qualifier,
        });
    }

    plan
}
