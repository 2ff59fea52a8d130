//! Alias discovery in the reference package.
//!
//! Scans top-level `var`, `const` and `type` declarations for names whose
//! whole definition is a single `pkg.Name` reference to another package, and
//! resolves each one through the declaring file's imports. The result is an
//! [`AliasMap`] that is built once and only read afterwards.

use crate::error::{Result, UnaliasError};
use crate::scanner::{self, GoFile};
use colored::Colorize;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path};
use tree_sitter::Node;

/// Where an alias really points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasEntry {
    /// Name declared in the reference package, e.g. `Foo`.
    pub alias_name: String,
    /// Name of the symbol in its defining package, e.g. `Bar`.
    pub canonical_name: String,
    /// Qualifier the reference package uses for the defining package, e.g. `pkgB`.
    pub origin_module_alias: String,
    /// Import path of the defining package, e.g. `example.com/b`.
    pub origin_module_path: String,
}

impl std::fmt::Display for AliasEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} ({:?})",
            self.origin_module_alias, self.canonical_name, self.origin_module_path
        )
    }
}

/// Alias name to entry. Later inserts for the same name replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AliasMap {
    entries: BTreeMap<String, AliasEntry>,
}

impl AliasMap {
    pub fn get(&self, alias_name: &str) -> Option<&AliasEntry> {
        self.entries.get(alias_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.values()
    }

    fn insert(&mut self, entry: AliasEntry) -> Option<AliasEntry> {
        self.entries.insert(entry.alias_name.clone(), entry)
    }
}

impl FromIterator<AliasEntry> for AliasMap {
    fn from_iter<I: IntoIterator<Item = AliasEntry>>(iter: I) -> Self {
        let mut map = AliasMap::default();
        for entry in iter {
            map.insert(entry);
        }
        map
    }
}

/// Which alias candidates must have an exported (upper-case) name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFilter {
    /// Type aliases must be exported, value aliases need not be.
    #[default]
    Types,
    /// Both type and value aliases must be exported.
    All,
    /// No export requirement.
    None,
}

impl ExportFilter {
    fn admits(self, name: &str, kind: CandidateKind) -> bool {
        let required = match (self, kind) {
            (ExportFilter::None, _) => false,
            (ExportFilter::All, _) => true,
            (ExportFilter::Types, CandidateKind::Type) => true,
            (ExportFilter::Types, CandidateKind::Value) => false,
        };
        !required || is_exported(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateKind {
    Type,
    Value,
}

/// A declared name whose definition is a selector, before import resolution.
struct Candidate<'t> {
    name: String,
    qualifier: Node<'t>,
    member: Node<'t>,
}

/// A parsed reference package: one directory, one package clause name.
#[derive(Debug)]
pub struct ReferencePackage {
    pub name: String,
    pub files: Vec<GoFile>,
}

/// Parses the `.go` files directly in `dir` and keeps those of one package.
///
/// With `package` unset, `_test` packages are dropped and exactly one
/// package name must remain.
pub fn load_package(dir: &Path, package: Option<&str>) -> Result<ReferencePackage> {
    let paths = scanner::package_files(dir)?;
    if paths.is_empty() {
        return Err(UnaliasError::invalid_input(format!(
            "no Go files in reference directory {}",
            dir.display()
        )));
    }
    let files = scanner::parse_files(&paths)?;
    select_package(files, package, dir)
}

fn select_package(
    files: Vec<GoFile>,
    package: Option<&str>,
    dir: &Path,
) -> Result<ReferencePackage> {
    let name = match package {
        Some(name) => name.to_string(),
        None => {
            let mut names: Vec<&str> = files
                .iter()
                .map(|f| f.package.as_str())
                .filter(|name| !name.ends_with("_test"))
                .collect();
            names.sort_unstable();
            names.dedup();
            match names.as_slice() {
                [single] => single.to_string(),
                [] => {
                    return Err(UnaliasError::invalid_input(format!(
                        "{} contains only test packages",
                        dir.display()
                    )));
                }
                many => {
                    return Err(UnaliasError::invalid_input(format!(
                        "{} contains several packages ({}); pass --reference-package",
                        dir.display(),
                        many.join(", ")
                    )));
                }
            }
        }
    };

    let files: Vec<GoFile> = files.into_iter().filter(|f| f.package == name).collect();
    if files.is_empty() {
        return Err(UnaliasError::invalid_input(format!(
            "no files of package '{}' in {}",
            name,
            dir.display()
        )));
    }
    Ok(ReferencePackage { name, files })
}

/// Builds the alias map for a package's files.
///
/// Files are taken in the given order and candidates in source order, so for
/// duplicate names the last definition seen wins. Fails fast on a value alias
/// whose qualifier is itself a compound expression.
pub fn resolve(files: &[GoFile], filter: ExportFilter) -> Result<AliasMap> {
    let mut aliases = AliasMap::default();

    for file in files {
        let imports: HashMap<String, String> = scanner::imports(file)
            .into_iter()
            .filter_map(|spec| {
                let local = spec.local_name()?.to_string();
                Some((local, spec.path))
            })
            .collect();

        for candidate in candidates(file, filter)? {
            let qualifier = file.text(candidate.qualifier);
            let Some(path) = imports.get(qualifier) else {
                tracing::debug!(
                    file = %file.path.display(),
                    name = %candidate.name,
                    qualifier,
                    "skipping candidate with non-import qualifier"
                );
                continue;
            };
            let entry = AliasEntry {
                alias_name: candidate.name,
                canonical_name: file.text(candidate.member).to_string(),
                origin_module_alias: qualifier.to_string(),
                origin_module_path: path.clone(),
            };
            tracing::debug!(
                file = %file.path.display(),
                alias = %entry.alias_name,
                canonical = %entry,
                "resolved alias"
            );
            if let Some(previous) = aliases.insert(entry) {
                tracing::debug!(
                    alias = %previous.alias_name,
                    replaced = %previous,
                    "alias redefined, keeping later definition"
                );
            }
        }
    }

    Ok(aliases)
}

fn candidates<'t>(file: &'t GoFile, filter: ExportFilter) -> Result<Vec<Candidate<'t>>> {
    let mut found = Vec::new();

    for decl in scanner::top_level(
        file,
        &["var_declaration", "const_declaration", "type_declaration"],
    ) {
        if decl.kind() == "type_declaration" {
            for spec in scanner::specs_of(decl, &["type_spec", "type_alias"]) {
                if let Some(candidate) = type_candidate(file, spec, filter) {
                    found.push(candidate);
                }
            }
        } else {
            for spec in scanner::specs_of(decl, &["var_spec", "const_spec"]) {
                value_candidates(file, spec, filter, &mut found)?;
            }
        }
    }

    Ok(found)
}

/// `type N pkg.T` or `type N = pkg.T`.
fn type_candidate<'t>(
    file: &'t GoFile,
    spec: Node<'t>,
    filter: ExportFilter,
) -> Option<Candidate<'t>> {
    let name = file.text(spec.child_by_field_name("name")?).to_string();
    if !filter.admits(&name, CandidateKind::Type) {
        return None;
    }
    let ty = spec.child_by_field_name("type")?;
    if ty.kind() != "qualified_type" {
        return None;
    }
    Some(Candidate {
        name,
        qualifier: ty.child_by_field_name("package")?,
        member: ty.child_by_field_name("name")?,
    })
}

/// `var A, B = pkg.X, pkg.Y`: names and values pair up positionally.
fn value_candidates<'t>(
    file: &'t GoFile,
    spec: Node<'t>,
    filter: ExportFilter,
    found: &mut Vec<Candidate<'t>>,
) -> Result<()> {
    let Some(value) = spec.child_by_field_name("value") else {
        return Ok(());
    };

    let mut cursor = spec.walk();
    let names: Vec<Node<'t>> = spec
        .children_by_field_name("name", &mut cursor)
        .filter(|n| n.kind() == "identifier")
        .collect();
    let values: Vec<Node<'t>> = if value.kind() == "expression_list" {
        let mut inner = value.walk();
        value
            .named_children(&mut inner)
            .filter(|n| n.kind() != "comment")
            .collect()
    } else {
        vec![value]
    };

    for (name, value) in names.into_iter().zip(values) {
        let name = file.text(name).to_string();
        if name == "_"
            || value.kind() != "selector_expression"
            || !filter.admits(&name, CandidateKind::Value)
        {
            continue;
        }
        let (Some(operand), Some(field)) = (
            value.child_by_field_name("operand"),
            value.child_by_field_name("field"),
        ) else {
            continue;
        };
        if operand.kind() != "identifier" {
            return Err(UnaliasError::UnexpectedAliasShape {
                path: file.path.clone(),
                line: file.line_of(value.start_byte()),
                expr: file.text(value).to_string(),
            });
        }
        found.push(Candidate {
            name,
            qualifier: operand,
            member: field,
        });
    }

    Ok(())
}

/// Go's export rule: the name starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Derives the import path of `dir` from the nearest enclosing `go.mod`.
pub fn infer_import_path(dir: &Path) -> Result<String> {
    let dir = std::fs::canonicalize(dir).map_err(|source| UnaliasError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    for module_root in dir.ancestors() {
        let go_mod = module_root.join("go.mod");
        if !go_mod.is_file() {
            continue;
        }
        let contents = std::fs::read_to_string(&go_mod).map_err(|source| UnaliasError::Read {
            path: go_mod.clone(),
            source,
        })?;
        let module = module_directive(&contents).ok_or_else(|| {
            UnaliasError::invalid_input(format!("{} has no module directive", go_mod.display()))
        })?;

        let mut import_path = module.to_string();
        let relative = dir.strip_prefix(module_root).unwrap_or(Path::new(""));
        for component in relative.components() {
            if let Component::Normal(part) = component {
                import_path.push('/');
                import_path.push_str(&part.to_string_lossy());
            }
        }
        return Ok(import_path);
    }

    Err(UnaliasError::invalid_input(format!(
        "no go.mod found above {}; pass --reference-path",
        dir.display()
    )))
}

fn module_directive(go_mod: &str) -> Option<&str> {
    go_mod.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.split("//").next()?.trim().trim_matches('"');
        (!module.is_empty()).then_some(module)
    })
}

/// Prints the alias map as an aligned table to stdout.
pub fn print_table(aliases: &AliasMap) {
    let width = aliases.iter().map(|e| e.alias_name.len()).max().unwrap_or(0);
    for entry in aliases.iter() {
        println!(
            "{:<width$} {} {}.{} {}",
            entry.alias_name,
            "->".dimmed(),
            entry.origin_module_alias,
            entry.canonical_name,
            format!("({})", entry.origin_module_path).dimmed(),
            width = width
        );
    }
}
