use crate::config::EditBatch;
use crate::registry::ParsedTrees;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use structscope_api::{EditOutcome, Model};
use structscope_go::{GoParser, SynthesisError, synthesize_file};
use tempfile::NamedTempFile;

const ABORTED: &str = "not written: another file in the batch failed";

struct Staged {
    package: String,
    file: String,
    path: PathBuf,
    text: String,
    unchanged: bool,
}

enum Slot {
    Failed(EditOutcome),
    Staged(Staged),
}

/// Synthesizes every file of `edited` and writes the results according to
/// `policy`. Outcomes follow the submission order.
///
/// Successfully written files replace their registry entry.
pub fn apply_edits(
    parser: &GoParser,
    trees: &mut ParsedTrees,
    edited: &Model,
    policy: EditBatch,
) -> Vec<EditOutcome> {
    let mut slots = Vec::new();

    for package in &edited.packages {
        for file in &package.files {
            let Some(original) = trees.get(&package.name, &file.name) else {
                let err = SynthesisError::UnknownFile {
                    package: package.name.clone(),
                    file: file.name.clone(),
                };
                slots.push(Slot::Failed(EditOutcome::failed(
                    &package.name,
                    &file.name,
                    err.to_string(),
                )));
                continue;
            };

            let elsewhere = trees.methods_declared_outside(&package.name, &file.name);
            match synthesize_file(parser, file, original, &elsewhere) {
                Ok(text) => slots.push(Slot::Staged(Staged {
                    package: package.name.clone(),
                    file: file.name.clone(),
                    path: original.path.clone(),
                    unchanged: text == original.source,
                    text,
                })),
                Err(err) => {
                    tracing::warn!("Rejected edit of {}: {}", file.name, err);
                    slots.push(Slot::Failed(EditOutcome::failed(
                        &package.name,
                        &file.name,
                        err.to_string(),
                    )));
                }
            }
        }
    }

    let any_failed = slots.iter().any(|s| matches!(s, Slot::Failed(_)));
    if policy == EditBatch::Atomic && any_failed {
        return slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Failed(outcome) => outcome,
                Slot::Staged(s) => EditOutcome::failed(s.package, s.file, ABORTED.to_string()),
            })
            .collect();
    }

    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Failed(outcome) => outcome,
            Slot::Staged(staged) => commit(parser, trees, staged),
        })
        .collect()
}

fn commit(parser: &GoParser, trees: &mut ParsedTrees, staged: Staged) -> EditOutcome {
    if staged.unchanged {
        return EditOutcome::written(staged.package, staged.file);
    }
    if let Err(err) = write_atomically(&staged.path, &staged.text) {
        tracing::error!("Failed to write {}: {}", staged.path.display(), err);
        return EditOutcome::failed(staged.package, staged.file, err.to_string());
    }
    tracing::info!("Rewrote {}", staged.path.display());

    match parser.parse_file(&staged.path, staged.text) {
        Ok(parsed) => trees.update(parsed),
        Err(err) => tracing::warn!("Rewritten file no longer parses: {}", err),
    }
    EditOutcome::written(staged.package, staged.file)
}

/// Replaces `path` with `text` via a temporary sibling, keeping the
/// original permissions. Readers see either the old or the new content.
pub fn write_atomically(path: &Path, text: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
