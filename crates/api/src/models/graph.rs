use super::structure::{File, Function, Package, Struct};
use serde::{Deserialize, Serialize};

/// One endpoint of a field → struct reference.
///
/// On the `from` side every member is set. On the `to` side
/// `field_type_name` stays empty and `file_name` is only known once the edge
/// has been resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub field_type_name: String,
    pub struct_name: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub file_name: String,
}

impl Node {
    /// A reference target whose defining file is not known yet.
    pub fn target(struct_name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            struct_name: struct_name.into(),
            package_name: package_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub to: Node,
    pub from: Node,
}

/// The full structural graph exchanged with observers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub global_functions: Vec<Function>,
}

impl Model {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn find_package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Locates the file defining `struct_name` inside package `package`.
    pub fn find_struct(&self, package: &str, struct_name: &str) -> Option<(&File, &Struct)> {
        let pkg = self.find_package(package)?;
        pkg.files
            .iter()
            .find_map(|f| f.find_struct(struct_name).map(|s| (f, s)))
    }

    pub fn file_count(&self) -> usize {
        self.packages.iter().map(|p| p.files.len()).sum()
    }

    pub fn struct_count(&self) -> usize {
        self.packages
            .iter()
            .flat_map(|p| p.files.iter())
            .map(|f| f.structs.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, TypeRef};

    #[test]
    fn test_model_wire_keys() {
        let mut st = Struct::new("A");
        st.fields.push(Field::new("B", TypeRef::new("*B", vec!["B".into()])));
        let model = Model {
            packages: vec![Package {
                name: "main".into(),
                files: vec![File {
                    name: "a.go".into(),
                    structs: vec![st],
                }],
            }],
            edges: vec![Edge {
                from: Node {
                    field_type_name: "B".into(),
                    struct_name: "A".into(),
                    package_name: "main".into(),
                    file_name: "a.go".into(),
                },
                to: Node::target("B", "main"),
            }],
            global_functions: vec![],
        };

        let json = serde_json::to_value(&model).unwrap();
        assert!(json.get("globalFunctions").is_some());
        let field = &json["packages"][0]["files"][0]["structs"][0]["fields"][0];
        assert_eq!(field["type"]["literal"], "*B");
        assert!(field.get("tag").is_none());
        assert!(field.get("embedded").is_none());
        assert_eq!(json["edges"][0]["from"]["fieldTypeName"], "B");
        assert_eq!(json["edges"][0]["to"]["structName"], "B");
    }

    #[test]
    fn test_model_accepts_sparse_observer_payload() {
        let payload = r#"{"packages":[{"name":"main","files":[{"name":"a.go","structs":[
            {"name":"A","fields":[{"name":"X","type":{"literal":"int"}}]}]}]}]}"#;
        let model: Model = serde_json::from_str(payload).unwrap();
        assert!(model.edges.is_empty());
        let (file, st) = model.find_struct("main", "A").unwrap();
        assert_eq!(file.name, "a.go");
        assert_eq!(st.field("X").unwrap().type_ref.literal, "int");
        assert!(st.methods.is_empty());
    }
}
