//! go-unalias library for rewriting uses of Go alias declarations.
//!
//! An alias is a package-level name whose whole definition is a reference to
//! a symbol in another package (`type Foo = b.Bar`, `var New = b.NewBar`).
//! This library finds such aliases in one reference package and rewrites
//! `ref.Foo` usages elsewhere to `b.Bar`, adding the import for `b` where the
//! file lacks it. The workflow has three phases:
//!
//! 1. **Resolving**: Parse the reference package and build the frozen [`AliasMap`]
//! 2. **Analysis**: Plan the substitutions and missing imports of each target file
//! 3. **Rewriting**: Apply each plan to its file's original text and write dirty files back
//!
//! # Example
//!
//! ```no_run
//! use go_unalias::{analyzer, resolver, rewriter, scanner};
//! use go_unalias::resolver::ExportFilter;
//! use std::path::{Path, PathBuf};
//!
//! let reference = resolver::load_package(Path::new("./api/types"), None).unwrap();
//! let aliases = resolver::resolve(&reference.files, ExportFilter::default()).unwrap();
//!
//! let paths = scanner::collect_go_files(&[PathBuf::from("./cmd")], &Default::default()).unwrap();
//! let files = scanner::parse_files(&paths).unwrap();
//! for file in &files {
//!     let plan = analyzer::analyze_file(file, &aliases, "example.com/project/api/types");
//!     rewriter::apply(file, &plan).unwrap();
//! }
//! ```

pub mod analyzer;
pub mod error;
pub mod resolver;
pub mod rewriter;
pub mod scanner;

// Re-export commonly used types at crate root
pub use analyzer::{Diagnostics, FilePlan, Substitution};
pub use error::UnaliasError;
pub use resolver::{AliasEntry, AliasMap, ExportFilter};
pub use scanner::{GoFile, ScanOptions};
