use anyhow::Context;
use std::path::Path;
use structscope_core::extract_tree;
use structscope_go::GoParser;

pub fn run(path: &Path, pretty: bool) -> anyhow::Result<()> {
    let parser = GoParser::new()?;
    let extraction =
        extract_tree(&parser, path).with_context(|| format!("extracting {}", path.display()))?;
    tracing::info!(
        "Extracted {} structs from {}",
        extraction.model.struct_count(),
        path.display()
    );

    let json = if pretty {
        serde_json::to_string_pretty(&extraction.model)?
    } else {
        serde_json::to_string(&extraction.model)?
    };
    println!("{}", json);
    Ok(())
}
