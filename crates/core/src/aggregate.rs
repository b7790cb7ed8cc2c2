//! Turns a directory tree of Go sources into one [`Model`].

use crate::dedup::{attach_method, dedup_packages};
use crate::error::Result;
use crate::registry::ParsedTrees;
use crate::resolver::resolve_edges;
use crate::scanner;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use structscope_api::{Method, Model, Package};
use structscope_go::{FileExtraction, GoParser, ParsedFile, extract_file};

/// Result of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub model: Model,
    pub trees: ParsedTrees,
}

/// Parses every Go file below `root` and builds a deduplicated model with
/// resolved edges.
///
/// Any file that fails to parse fails the whole pass.
pub fn extract_tree(parser: &GoParser, root: &Path) -> Result<Extraction> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for dir in scanner::collect_dirs(root)? {
        paths.extend(scanner::go_files(&dir)?);
    }

    // Parallel parse; collect keeps input order.
    let parsed: Vec<ParsedFile> = paths
        .par_iter()
        .map(|path| -> Result<ParsedFile> {
            let source = fs::read_to_string(path)?;
            Ok(parser.parse_file(path, source)?)
        })
        .collect::<Result<Vec<_>>>()?;

    let extractions: Vec<FileExtraction> = parsed.par_iter().map(extract_file).collect();

    // One package entry per (directory, package clause), in walk order.
    let mut grouped: IndexMap<(PathBuf, String), Package> = IndexMap::new();
    let mut detached: Vec<(String, String, Method)> = Vec::new();
    let mut drafts = Vec::new();
    let mut functions = Vec::new();

    for (file, extraction) in parsed.iter().zip(extractions) {
        let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
        grouped
            .entry((dir, file.package.clone()))
            .or_insert_with(|| Package {
                name: file.package.clone(),
                files: Vec::new(),
            })
            .files
            .push(extraction.file);
        drafts.extend(extraction.edges);
        functions.extend(extraction.functions);
        detached.extend(
            extraction
                .detached_methods
                .into_iter()
                .map(|(receiver, method)| (file.package.clone(), receiver, method)),
        );
    }

    let mut packages = dedup_packages(grouped.into_values().collect());

    for (package, receiver, method) in detached {
        let attached = packages
            .iter_mut()
            .find(|p| p.name == package)
            .is_some_and(|p| attach_method(p, &receiver, method));
        if !attached {
            tracing::debug!("Skipping method on non-struct receiver {}.{}", package, receiver);
        }
    }

    let edges = resolve_edges(drafts, &packages);

    let mut trees = ParsedTrees::new();
    for file in parsed {
        trees.insert(file);
    }

    let model = Model {
        packages,
        edges,
        global_functions: functions,
    };
    tracing::debug!(
        "Extracted {} packages, {} files, {} structs from {}",
        model.packages.len(),
        model.file_count(),
        model.struct_count(),
        root.display()
    );

    Ok(Extraction { model, trees })
}
