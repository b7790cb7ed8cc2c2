use indexmap::IndexMap;
use std::collections::HashSet;
use structscope_api::{File, Method, Package, Struct};

/// Merges packages sharing a name and drops repeated files, structs and
/// methods. The first occurrence always wins and keeps its position.
pub fn dedup_packages(packages: Vec<Package>) -> Vec<Package> {
    let mut merged: IndexMap<String, Package> = IndexMap::new();
    for package in packages {
        let slot = merged
            .entry(package.name.clone())
            .or_insert_with(|| Package {
                name: package.name.clone(),
                files: Vec::new(),
            });
        for file in package.files {
            if slot.find_file(&file.name).is_some() {
                tracing::debug!("Dropping duplicate file {} in package {}", file.name, slot.name);
                continue;
            }
            slot.files.push(dedup_file(file));
        }
    }
    merged.into_values().collect()
}

fn dedup_file(file: File) -> File {
    let mut seen = HashSet::new();
    let structs = file
        .structs
        .into_iter()
        .filter(|st| seen.insert(st.name.clone()))
        .map(|st| Struct {
            methods: dedup_methods(st.methods),
            ..st
        })
        .collect();
    File {
        name: file.name,
        structs,
    }
}

pub fn dedup_methods(methods: Vec<Method>) -> Vec<Method> {
    let mut seen = HashSet::new();
    methods
        .into_iter()
        .filter(|m| seen.insert(m.name.clone()))
        .collect()
}

/// Attaches `method` to the first struct named `receiver` in `package`,
/// unless that struct already has a method of the same name.
///
/// Returns `false` when no such struct exists.
pub fn attach_method(package: &mut Package, receiver: &str, method: Method) -> bool {
    let Some(st) = package
        .files
        .iter_mut()
        .find_map(|f| f.structs.iter_mut().find(|s| s.name == receiver))
    else {
        return false;
    };
    if st.method(&method.name).is_none() {
        st.methods.push(method);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str) -> Method {
        Method {
            name: name.to_string(),
            return_types: Vec::new(),
        }
    }

    fn file(name: &str, structs: &[&str]) -> File {
        File {
            name: name.to_string(),
            structs: structs.iter().map(|s| Struct::new(*s)).collect(),
        }
    }

    #[test]
    fn test_same_name_packages_merge_in_order() {
        let packages = vec![
            Package {
                name: "util".into(),
                files: vec![file("a/x.go", &["X"])],
            },
            Package {
                name: "main".into(),
                files: vec![file("main.go", &[])],
            },
            Package {
                name: "util".into(),
                files: vec![file("b/y.go", &["Y"]), file("a/x.go", &["Shadow"])],
            },
        ];

        let merged = dedup_packages(packages);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "util");
        let names: Vec<_> = merged[0].files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a/x.go", "b/y.go"]);
        assert!(merged[0].files[0].find_struct("Shadow").is_none());
    }

    #[test]
    fn test_first_struct_and_method_win() {
        let mut first = Struct::new("A");
        first.methods = vec![method("Run"), method("Run"), method("Stop")];
        let mut second = Struct::new("A");
        second.methods = vec![method("Other")];
        let packages = vec![Package {
            name: "p".into(),
            files: vec![File {
                name: "a.go".into(),
                structs: vec![first, second],
            }],
        }];

        let merged = dedup_packages(packages);
        let structs = &merged[0].files[0].structs;
        assert_eq!(structs.len(), 1);
        let methods: Vec<_> = structs[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["Run", "Stop"]);
    }

    #[test]
    fn test_attach_method_to_struct_in_sibling_file() {
        let mut package = Package {
            name: "p".into(),
            files: vec![file("a.go", &[]), file("b.go", &["B"])],
        };
        assert!(attach_method(&mut package, "B", method("Run")));
        assert!(attach_method(&mut package, "B", method("Run")));
        assert!(!attach_method(&mut package, "Missing", method("Run")));
        assert_eq!(package.files[1].structs[0].methods.len(), 1);
    }
}
