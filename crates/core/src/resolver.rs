use std::collections::HashMap;
use structscope_api::{Edge, Package};

/// `(package, struct) → defining file`, first definition wins.
pub struct StructIndex<'a> {
    files: HashMap<(&'a str, &'a str), &'a str>,
}

impl<'a> StructIndex<'a> {
    pub fn build(packages: &'a [Package]) -> Self {
        let mut files = HashMap::new();
        for package in packages {
            for file in &package.files {
                for st in &file.structs {
                    files
                        .entry((package.name.as_str(), st.name.as_str()))
                        .or_insert(file.name.as_str());
                }
            }
        }
        Self { files }
    }

    pub fn file_of(&self, package: &str, struct_name: &str) -> Option<&'a str> {
        self.files.get(&(package, struct_name)).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Stamps each draft edge with the file defining its target and drops the
/// ones whose target is not a known struct. Draft order is kept.
pub fn resolve_edges(drafts: Vec<Edge>, packages: &[Package]) -> Vec<Edge> {
    let index = StructIndex::build(packages);
    let total = drafts.len();

    let resolved: Vec<Edge> = drafts
        .into_iter()
        .filter_map(|mut edge| {
            match index.file_of(&edge.to.package_name, &edge.to.struct_name) {
                Some(file) => {
                    edge.to.file_name = file.to_string();
                    Some(edge)
                }
                None => {
                    tracing::debug!(
                        "Unresolved reference {}.{} from {}.{}",
                        edge.to.package_name,
                        edge.to.struct_name,
                        edge.from.struct_name,
                        edge.from.field_type_name
                    );
                    None
                }
            }
        })
        .collect();

    tracing::debug!("Resolved {}/{} edges", resolved.len(), total);
    resolved
}
