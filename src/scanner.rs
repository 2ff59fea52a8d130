//! Go file scanner.
//!
//! Recursively walks directories to collect `.go` files, skipping entries the
//! Go tool itself ignores. Uses tree-sitter to parse each file and extract the
//! two things the rewrite cares about: import specs and qualified references
//! (`pkg.Name`), both with byte spans into the original source.

use crate::error::{Result, UnaliasError};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};
use walkdir::WalkDir;

/// Directory names skipped by default, in addition to `.`/`_` prefixed entries.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &["testdata", "vendor"];

/// Controls which files `collect_go_files` returns.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub excludes: Vec<glob::Pattern>,
    pub default_excludes: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            excludes: Vec::new(),
            default_excludes: true,
        }
    }
}

impl ScanOptions {
    /// Compiles `patterns` into exclusion globs.
    pub fn new(patterns: &[String], default_excludes: bool) -> Result<Self> {
        let excludes = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    UnaliasError::invalid_input(format!("bad exclude pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ScanOptions {
            excludes,
            default_excludes,
        })
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry, root: &Path) -> bool {
        // Never exclude the walk root itself, even if it is `.`.
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if self.default_excludes {
            if name.starts_with('.') || name.starts_with('_') {
                return true;
            }
            if entry.file_type().is_dir() && DEFAULT_EXCLUDED_DIRS.contains(&&*name) {
                return true;
            }
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        self.excludes
            .iter()
            .any(|p| p.matches(&name) || p.matches_path(relative))
    }
}

/// A parsed Go source file. The source text is kept alongside the tree so
/// every node span can be resolved back to text.
pub struct GoFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
    /// Name from the `package` clause.
    pub package: String,
}

impl std::fmt::Debug for GoFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoFile")
            .field("path", &self.path)
            .field("package", &self.package)
            .finish_non_exhaustive()
    }
}

impl GoFile {
    pub fn text(&self, node: Node) -> &str {
        node_text(node, self.source.as_bytes())
    }

    /// 1-indexed line of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        offset_to_line_col(&self.source, offset).0
    }
}

/// One import spec: `name "path"` or `"path"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit name as written, including `.` and `_`.
    pub name: Option<String>,
    /// Unquoted import path.
    pub path: String,
}

impl ImportSpec {
    /// The identifier this import binds in the file, if any.
    ///
    /// Dot and blank imports bind nothing usable as a qualifier.
    pub fn local_name(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some(".") | Some("_") => None,
            Some(name) => Some(name),
            None => Some(default_import_name(&self.path)),
        }
    }
}

/// Default package name for an import path: its final segment.
pub fn default_import_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A two-part `qualifier.member` reference with identifier spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedRef {
    pub qualifier: String,
    pub member: String,
    pub qualifier_span: Range<usize>,
    pub member_span: Range<usize>,
    /// Line number, 1-indexed.
    pub line: usize,
    /// Column number, 1-indexed.
    pub column: usize,
}

impl std::fmt::Display for QualifiedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.qualifier, self.member)
    }
}

/// Collects all `.go` files under `paths` in sorted order.
pub fn collect_go_files(paths: &[PathBuf], options: &ScanOptions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !options.is_excluded(e, path))
        {
            let entry = entry?;
            if entry.file_type().is_file() && is_go_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    Ok(files)
}

/// Lists the `.go` files directly inside `dir`, sorted. One directory is one package.
pub fn package_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_go_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_go_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "go")
}

/// Reads and parses every file in `paths`, failing on the first syntax error.
pub fn parse_files(paths: &[PathBuf]) -> Result<Vec<GoFile>> {
    let mut parser = go_parser()?;
    paths
        .iter()
        .map(|path| {
            let source = std::fs::read_to_string(path).map_err(|source| UnaliasError::Read {
                path: path.clone(),
                source,
            })?;
            parse_with(&mut parser, path, source)
        })
        .collect()
}

/// Parses Go source held in memory.
pub fn parse_source(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<GoFile> {
    let mut parser = go_parser()?;
    parse_with(&mut parser, &path.into(), source.into())
}

fn go_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
    Ok(parser)
}

fn parse_with(parser: &mut Parser, path: &Path, source: String) -> Result<GoFile> {
    let tree = parser.parse(&source, None).ok_or_else(|| UnaliasError::Parse {
        path: path.to_path_buf(),
        line: 1,
        column: 1,
        snippet: String::new(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(path, &source, root));
    }

    let package = package_name(root, &source).ok_or_else(|| UnaliasError::Parse {
        path: path.to_path_buf(),
        line: 1,
        column: 1,
        snippet: "missing package clause".to_string(),
    })?;

    Ok(GoFile {
        path: path.to_path_buf(),
        source,
        tree,
        package,
    })
}

fn package_name(root: Node, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let clause = root
        .named_children(&mut cursor)
        .find(|n| n.kind() == "package_clause")?;
    let ident = clause.named_child(0)?;
    Some(node_text(ident, source.as_bytes()).to_string())
}

/// Builds a parse error pointing at the first ERROR or MISSING node.
fn syntax_error(path: &Path, source: &str, root: Node) -> UnaliasError {
    let mut culprit = None;
    preorder(root, |node| {
        if culprit.is_none() && (node.is_error() || node.is_missing()) {
            culprit = Some(node);
        }
    });
    let node = culprit.unwrap_or(root);
    let snippet = if node.is_missing() {
        format!("missing {}", node.kind())
    } else {
        let text = node_text(node, source.as_bytes());
        text.lines().next().unwrap_or("").chars().take(40).collect()
    };
    let (line, column) = offset_to_line_col(source, node.start_byte());
    UnaliasError::Parse {
        path: path.to_path_buf(),
        line,
        column,
        snippet,
    }
}

/// Extracts every import spec of the file, in source order.
pub fn imports(file: &GoFile) -> Vec<ImportSpec> {
    let mut specs = Vec::new();
    for decl in top_level(file, &["import_declaration"]) {
        for spec in specs_of(decl, &["import_spec"]) {
            if let Some(import) = import_spec(file, spec) {
                specs.push(import);
            }
        }
    }
    specs
}

fn import_spec(file: &GoFile, spec: Node) -> Option<ImportSpec> {
    let path = unquote(file.text(spec.child_by_field_name("path")?)).to_string();
    let name = spec
        .child_by_field_name("name")
        .map(|n| file.text(n).to_string());
    Some(ImportSpec { name, path })
}

/// Extracts every qualified reference in the file, in preorder.
///
/// Covers selector expressions whose operand is a plain identifier
/// (`types.Foo`, `types.Foo(x)`) and qualified types (`*types.Foo`,
/// `[]types.Foo{}`). Chained selectors such as `a.b.C` yield only their inner
/// `a.b` part.
pub fn qualified_refs(file: &GoFile) -> Vec<QualifiedRef> {
    let mut refs = Vec::new();
    preorder(file.tree.root_node(), |node| {
        let parts = match node.kind() {
            "selector_expression" => node
                .child_by_field_name("operand")
                .filter(|operand| operand.kind() == "identifier")
                .zip(node.child_by_field_name("field")),
            "qualified_type" => node
                .child_by_field_name("package")
                .zip(node.child_by_field_name("name")),
            _ => None,
        };
        if let Some((qualifier, member)) = parts {
            let (line, column) = offset_to_line_col(&file.source, node.start_byte());
            refs.push(QualifiedRef {
                qualifier: file.text(qualifier).to_string(),
                member: file.text(member).to_string(),
                qualifier_span: qualifier.byte_range(),
                member_span: member.byte_range(),
                line,
                column,
            });
        }
    });
    refs
}

/// Top-level declarations of any of `kinds`, in source order.
pub(crate) fn top_level<'t>(file: &'t GoFile, kinds: &[&str]) -> Vec<Node<'t>> {
    let root = file.tree.root_node();
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| kinds.contains(&n.kind()))
        .collect()
}

/// Specs of a declaration, whether written bare or inside a parenthesized list.
pub(crate) fn specs_of<'t>(decl: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut specs = Vec::new();
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            specs.push(child);
        } else if child.kind().ends_with("_spec_list") {
            let mut inner = child.walk();
            specs.extend(
                child
                    .named_children(&mut inner)
                    .filter(|n| kinds.contains(&n.kind())),
            );
        }
    }
    specs
}

/// Visits `root` and all its descendants in document order.
pub(crate) fn preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

pub(crate) fn node_text<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn unquote(literal: &str) -> &str {
    literal.trim_matches(|c| c == '"' || c == '`')
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
