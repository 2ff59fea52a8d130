//! File rewriting for applying a [`FilePlan`].
//!
//! Performs position-aware replacement using the byte spans captured during
//! parsing. Qualified references are edited first, then the import block is
//! patched; all edits are computed against the untouched original source and
//! applied in reverse offset order, so they never disturb each other.

use crate::analyzer::FilePlan;
use crate::error::{Result, UnaliasError};
use crate::scanner::{self, GoFile};
use std::io::Write;
use std::path::Path;
use tree_sitter::Node;

/// A single text replacement with position information.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    start: usize,
    end: usize,
    new_text: String,
}

impl Replacement {
    fn insert(at: usize, text: String) -> Self {
        Replacement {
            start: at,
            end: at,
            new_text: text,
        }
    }
}

/// Renders the rewritten source for `plan`. The parsed file is not modified.
pub fn render(file: &GoFile, plan: &FilePlan) -> String {
    let mut replacements = Vec::new();

    for sub in &plan.substitutions {
        let r = &sub.reference;
        if r.qualifier != sub.qualifier {
            replacements.push(Replacement {
                start: r.qualifier_span.start,
                end: r.qualifier_span.end,
                new_text: sub.qualifier.clone(),
            });
        }
        if r.member != sub.entry.canonical_name {
            replacements.push(Replacement {
                start: r.member_span.start,
                end: r.member_span.end,
                new_text: sub.entry.canonical_name.clone(),
            });
        }
    }

    if !plan.pending_imports.is_empty() {
        let specs: Vec<String> = plan
            .pending_imports
            .iter()
            .map(|(path, alias)| import_spec_text(path, alias))
            .collect();
        replacements.push(import_patch(file, &specs));
    }

    apply_replacements(&file.source, replacements)
}

/// Renders and writes `plan` if it changes anything. Returns whether the file was written.
pub fn apply(file: &GoFile, plan: &FilePlan) -> Result<bool> {
    if !plan.is_dirty() {
        return Ok(false);
    }
    let contents = render(file, plan);
    write_file(&file.path, &contents)?;
    Ok(true)
}

/// Writes `contents` over `path` through a temporary file in the same directory.
///
/// The target is replaced only after the complete text is flushed; on failure
/// the temporary file is dropped and the original stays intact.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    let write_err = |source| UnaliasError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    if let Ok(metadata) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(write_err)?;
    }
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file_mut().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// `alias "path"`, or just `"path"` when the alias is the path's default name.
fn import_spec_text(path: &str, alias: &str) -> String {
    if scanner::default_import_name(path) == alias {
        format!("\"{}\"", path)
    } else {
        format!("{} \"{}\"", alias, path)
    }
}

/// Builds the edit that appends `specs` to the file's first import declaration.
///
/// A lone cgo `import "C"` is never chosen: grouping it would detach its
/// preamble comment. Without another declaration a fresh one is added after
/// the last import declaration, or after the package clause.
fn import_patch(file: &GoFile, specs: &[String]) -> Replacement {
    let source = &file.source;
    let nl = line_ending(source);
    let decls = scanner::top_level(file, &["import_declaration"]);
    let Some(decl) = decls.iter().copied().find(|decl| !is_cgo_import(file, *decl)) else {
        let at = decls
            .last()
            .copied()
            .or_else(|| scanner::top_level(file, &["package_clause"]).first().copied())
            .map(|node| node.end_byte())
            .unwrap_or(0);
        return new_import_declaration(at, specs, nl);
    };

    let mut cursor = decl.walk();
    let list = decl
        .named_children(&mut cursor)
        .find(|n| n.kind() == "import_spec_list");

    match (list, decl.named_child(0)) {
        (Some(list), _) => append_to_group(source, list, specs, nl),
        (None, Some(spec)) => {
            // `import "fmt"` becomes a grouped block holding the old spec and the new ones.
            let mut text = format!("({nl}\t{}{nl}", file.text(spec));
            for s in specs {
                text.push('\t');
                text.push_str(s);
                text.push_str(nl);
            }
            text.push(')');
            Replacement {
                start: spec.start_byte(),
                end: spec.end_byte(),
                new_text: text,
            }
        }
        (None, None) => new_import_declaration(decl.end_byte(), specs, nl),
    }
}

/// True for a declaration whose only spec is the cgo pseudo-package `"C"`.
fn is_cgo_import(file: &GoFile, decl: Node) -> bool {
    let specs = scanner::specs_of(decl, &["import_spec"]);
    match specs.as_slice() {
        [spec] => spec
            .child_by_field_name("path")
            .is_some_and(|path| file.text(path) == "\"C\""),
        _ => false,
    }
}

fn append_to_group(source: &str, list: Node, specs: &[String], nl: &str) -> Replacement {
    let close = list.end_byte().saturating_sub(1);
    let mut cursor = list.walk();
    let last_spec = list
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "import_spec")
        .last();
    let indent = last_spec
        .map(|spec| line_indent(source, spec.start_byte()))
        .filter(|indent| !indent.is_empty())
        .unwrap_or("\t");

    let line_start = source[..close].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let closes_own_line = source[line_start..close].trim().is_empty();

    if closes_own_line {
        let mut text = String::new();
        for s in specs {
            text.push_str(indent);
            text.push_str(s);
            text.push_str(nl);
        }
        Replacement::insert(line_start, text)
    } else {
        // `import ("fmt")`: break the new specs onto their own lines.
        let mut text = String::new();
        for s in specs {
            text.push_str(nl);
            text.push_str(indent);
            text.push_str(s);
        }
        text.push_str(nl);
        Replacement::insert(close, text)
    }
}

/// Inserts a fresh grouped import declaration at `at`.
fn new_import_declaration(at: usize, specs: &[String], nl: &str) -> Replacement {
    let mut text = format!("{nl}{nl}import ({nl}");
    for s in specs {
        text.push('\t');
        text.push_str(s);
        text.push_str(nl);
    }
    text.push(')');
    Replacement::insert(at, text)
}

/// `\r\n` when the file already uses it, otherwise `\n`.
fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Leading whitespace of the line containing `offset`.
fn line_indent(source: &str, offset: usize) -> &str {
    let start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &source[start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len]
}

/// Applies replacements to source content, returning the modified string.
///
/// Sorts replacements by start offset (descending) and applies each in turn.
/// This ensures earlier replacements don't invalidate later offsets.
fn apply_replacements(content: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = content.to_string();
    for rep in replacements {
        if rep.start <= rep.end && rep.end <= result.len() {
            result.replace_range(rep.start..rep.end, &rep.new_text);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_file;
    use crate::resolver::{AliasEntry, AliasMap};
    use crate::scanner::parse_source;

    const REF: &str = "example.com/ref";

    fn aliases() -> AliasMap {
        [
            ("Foo", "Bar", "pkgB", "example.com/b"),
            ("Check", "CheckConfig", "corev2", "example.com/core/v2"),
            ("Entity", "Entity", "v2", "example.com/core/v2"),
        ]
        .into_iter()
        .map(|(alias, canonical, module_alias, path)| AliasEntry {
            alias_name: alias.to_string(),
            canonical_name: canonical.to_string(),
            origin_module_alias: module_alias.to_string(),
            origin_module_path: path.to_string(),
        })
        .collect()
    }

    fn rewrite(source: &str) -> String {
        let file = parse_source("target.go", source).unwrap();
        let plan = analyze_file(&file, &aliases(), REF);
        let out = render(&file, &plan);
        assert_eq!(file.source, source, "parsed file must not be mutated");
        out
    }

    #[test]
    fn adds_import_to_grouped_block() {
        let out = rewrite(
            r#"package app

import (
	"fmt"

	types "example.com/ref"
)

func main() {
	fmt.Println(types.Foo{})
}
"#,
        );
        insta::assert_snapshot!(out, @r#"
package app

import (
	"fmt"

	types "example.com/ref"
	pkgB "example.com/b"
)

func main() {
	fmt.Println(pkgB.Bar{})
}
"#);
    }

    #[test]
    fn reuses_existing_import_without_duplicating() {
        let source = r#"package app

import (
	b "example.com/b"
	types "example.com/ref"
)

var x *types.Foo
"#;
        let out = rewrite(source);
        assert!(out.contains("var x *b.Bar\n"));
        assert_eq!(out.matches("\"example.com/b\"").count(), 1);
    }

    #[test]
    fn omits_alias_matching_default_name() {
        let out = rewrite(
            "package app\n\nimport (\n\ttypes \"example.com/ref\"\n)\n\nvar e types.Entity\nvar c types.Check\n",
        );
        assert_eq!(
            out,
            "package app\n\nimport (\n\ttypes \"example.com/ref\"\n\t\"example.com/core/v2\"\n)\n\nvar e v2.Entity\nvar c v2.CheckConfig\n"
        );
    }

    #[test]
    fn converts_single_import_to_group() {
        let out = rewrite("package app\n\nimport types \"example.com/ref\"\n\nvar x types.Foo\n");
        assert_eq!(
            out,
            "package app\n\nimport (\n\ttypes \"example.com/ref\"\n\tpkgB \"example.com/b\"\n)\n\nvar x pkgB.Bar\n"
        );
    }

    #[test]
    fn patches_only_the_first_import_declaration() {
        let out = rewrite(
            "package app\n\nimport \"fmt\"\n\nimport types \"example.com/ref\"\n\nvar x = fmt.Sprint(types.Foo{})\n",
        );
        assert_eq!(
            out,
            "package app\n\nimport (\n\t\"fmt\"\n\tpkgB \"example.com/b\"\n)\n\nimport types \"example.com/ref\"\n\nvar x = fmt.Sprint(pkgB.Bar{})\n"
        );
    }

    #[test]
    fn leaves_cgo_preamble_attached_to_import_c() {
        let out = rewrite(
            "package app\n\n// #include <stdio.h>\nimport \"C\"\n\nimport types \"example.com/ref\"\n\nvar x types.Foo\n",
        );
        assert_eq!(
            out,
            "package app\n\n// #include <stdio.h>\nimport \"C\"\n\nimport (\n\ttypes \"example.com/ref\"\n\tpkgB \"example.com/b\"\n)\n\nvar x pkgB.Bar\n"
        );
    }

    #[test]
    fn adds_declaration_after_lone_cgo_import() {
        let file = parse_source(
            "target.go",
            "package app\n\n// #include <stdio.h>\nimport \"C\"\n\nvar x = C.int(1)\n",
        )
        .unwrap();
        let patch = import_patch(&file, &["pkgB \"example.com/b\"".to_string()]);
        let out = apply_replacements(&file.source, vec![patch]);
        assert_eq!(
            out,
            "package app\n\n// #include <stdio.h>\nimport \"C\"\n\nimport (\n\tpkgB \"example.com/b\"\n)\n\nvar x = C.int(1)\n"
        );
    }

    #[test]
    fn adds_declaration_after_package_clause_without_imports() {
        let file = parse_source("target.go", "package app\n\nvar x = 1\n").unwrap();
        let patch = import_patch(&file, &["\"fmt\"".to_string()]);
        assert_eq!(
            apply_replacements(&file.source, vec![patch]),
            "package app\n\nimport (\n\t\"fmt\"\n)\n\nvar x = 1\n"
        );
    }

    #[test]
    fn keeps_crlf_line_endings() {
        let grouped = rewrite(
            "package app\r\n\r\nimport (\r\n\ttypes \"example.com/ref\"\r\n)\r\n\r\nvar x types.Foo\r\n",
        );
        assert_eq!(
            grouped,
            "package app\r\n\r\nimport (\r\n\ttypes \"example.com/ref\"\r\n\tpkgB \"example.com/b\"\r\n)\r\n\r\nvar x pkgB.Bar\r\n"
        );

        let single = rewrite("package app\r\n\r\nimport types \"example.com/ref\"\r\n\r\nvar x types.Foo\r\n");
        assert_eq!(
            single,
            "package app\r\n\r\nimport (\r\n\ttypes \"example.com/ref\"\r\n\tpkgB \"example.com/b\"\r\n)\r\n\r\nvar x pkgB.Bar\r\n"
        );
    }

    #[test]
    fn rewrites_references_that_precede_the_import_declaration() {
        let out = rewrite("package app\n\nvar x types.Foo\n\nimport types \"example.com/ref\"\n");
        assert_eq!(
            out,
            "package app\n\nvar x pkgB.Bar\n\nimport (\n\ttypes \"example.com/ref\"\n\tpkgB \"example.com/b\"\n)\n"
        );
    }

    #[test]
    fn handles_group_closed_on_same_line() {
        let out = rewrite("package app\n\nimport (types \"example.com/ref\")\n\nvar x types.Foo\n");
        assert_eq!(
            out,
            "package app\n\nimport (types \"example.com/ref\"\n\tpkgB \"example.com/b\"\n)\n\nvar x pkgB.Bar\n"
        );
    }

    #[test]
    fn keeps_space_indentation_of_existing_specs() {
        let out = rewrite(
            "package app\n\nimport (\n    types \"example.com/ref\"\n)\n\nvar x types.Foo\n",
        );
        assert!(out.contains("\n    types \"example.com/ref\"\n    pkgB \"example.com/b\"\n)"));
    }

    #[test]
    fn preserves_comments_and_unrelated_selectors() {
        let source = r#"package app

import (
	types "example.com/ref" // the old home
)

// types.Foo is deprecated.
func f(x types.Unknown) types.Foo {
	s := "types.Foo"
	_ = s
	return types.Foo(x)
}
"#;
        let out = rewrite(source);
        assert!(out.contains("// types.Foo is deprecated.\n"));
        assert!(out.contains("s := \"types.Foo\""));
        assert!(out.contains("func f(x types.Unknown) pkgB.Bar {"));
        assert!(out.contains("return pkgB.Bar(x)"));
        assert!(out.contains("types \"example.com/ref\" // the old home\n\tpkgB \"example.com/b\"\n)"));
    }

    #[test]
    fn rewriting_twice_is_a_no_op() {
        let once = rewrite("package app\n\nimport types \"example.com/ref\"\n\nvar x types.Foo\n");
        let file = parse_source("target.go", once.clone()).unwrap();
        let plan = analyze_file(&file, &aliases(), REF);
        assert!(!plan.is_dirty());
        assert_eq!(render(&file, &plan), once);
    }

    #[test]
    fn apply_skips_clean_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.go");
        let source = "package app\n\nimport \"fmt\"\n\nvar x = fmt.Sprint(1)\n";
        std::fs::write(&path, source).unwrap();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let file = scanner::parse_files(std::slice::from_ref(&path)).unwrap().remove(0);
        let plan = analyze_file(&file, &aliases(), REF);
        assert!(!apply(&file, &plan).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), source);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn apply_writes_dirty_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirty.go");
        std::fs::write(&path, "package app\n\nimport types \"example.com/ref\"\n\nvar x types.Foo\n")
            .unwrap();

        let file = scanner::parse_files(std::slice::from_ref(&path)).unwrap().remove(0);
        let plan = analyze_file(&file, &aliases(), REF);
        assert!(apply(&file, &plan).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("var x pkgB.Bar"));
    }

    #[test]
    fn write_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.go");
        let err = write_file(&path, "package x\n").unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("out.go"));
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode.go");
        std::fs::write(&path, "package x\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_file(&path, "package y\n").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "package y\n");
    }

    #[test]
    fn replacements_apply_from_the_end() {
        let content = "a.B + a.B";
        let out = apply_replacements(
            content,
            vec![
                Replacement {
                    start: 0,
                    end: 1,
                    new_text: "xyz".to_string(),
                },
                Replacement {
                    start: 6,
                    end: 7,
                    new_text: "xyz".to_string(),
                },
                Replacement::insert(9, ";".to_string()),
            ],
        );
        assert_eq!(out, "xyz.B + xyz.B;");
    }
}
