use super::node_text;
use structscope_api::Node as RefNode;
use tree_sitter::Node;

/// Named composite types reachable from one type expression.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TypeShape {
    /// Printable references, including the `interface{}`/`func`/`chan` markers.
    pub names: Vec<String>,
    /// Reference targets with their package; markers have no target.
    pub targets: Vec<RefNode>,
}

impl TypeShape {
    fn reference(&mut self, display: String, struct_name: &str, package: &str) {
        self.names.push(display);
        self.targets.push(RefNode::target(struct_name, package));
    }
}

pub fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "byte"
            | "complex64"
            | "complex128"
            | "error"
            | "float32"
            | "float64"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "rune"
            | "string"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "any"
    )
}

/// Classifies a type node. Unqualified references are attributed to `package`.
pub fn resolve_type_shape(node: Node, source: &str, package: &str) -> TypeShape {
    let mut shape = TypeShape::default();
    collect(node, source, package, &mut shape);
    shape
}

fn collect(node: Node, source: &str, package: &str, shape: &mut TypeShape) {
    match node.kind() {
        "type_identifier" => {
            let name = node_text(node, source);
            if !name.is_empty() && !is_primitive(name) {
                shape.reference(name.to_string(), name, package);
            }
        }
        "qualified_type" => {
            let qualifier = node.child_by_field_name("package");
            let name = node.child_by_field_name("name");
            if let (Some(qualifier), Some(name)) = (qualifier, name) {
                let qualifier = node_text(qualifier, source);
                let name = node_text(name, source);
                shape.reference(format!("{}.{}", qualifier, name), name, qualifier);
            }
        }
        "pointer_type" | "parenthesized_type" => {
            if let Some(inner) = node.named_child(0) {
                collect(inner, source, package, shape);
            }
        }
        "array_type" | "slice_type" | "implicit_length_array_type" => {
            if let Some(element) = node.child_by_field_name("element") {
                collect(element, source, package, shape);
            }
        }
        "map_type" => {
            if let Some(key) = node.child_by_field_name("key") {
                collect(key, source, package, shape);
            }
            if let Some(value) = node.child_by_field_name("value") {
                collect(value, source, package, shape);
            }
        }
        "channel_type" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect(value, source, package, shape);
            }
            shape.names.push("chan".to_string());
        }
        "struct_type" => {
            for decl in struct_field_declarations(node) {
                if let Some(ty) = decl.child_by_field_name("type") {
                    collect(ty, source, package, shape);
                }
            }
        }
        // Type arguments are not resolved.
        "generic_type" => {
            if let Some(base) = node.child_by_field_name("type") {
                collect(base, source, package, shape);
            }
        }
        "interface_type" => shape.names.push("interface{}".to_string()),
        "function_type" => shape.names.push("func".to_string()),
        _ => {}
    }
}

/// The `field_declaration` children of a `struct_type` node.
pub(crate) fn struct_field_declarations(struct_node: Node) -> Vec<Node> {
    let mut cursor = struct_node.walk();
    let Some(list) = struct_node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|c| c.kind() == "field_declaration")
        .collect()
}

/// Name of the type behind pointers, parentheses, qualifiers and type
/// arguments: `*pkg.List[T]` → `List`.
pub fn base_type_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "type_identifier" => Some(node_text(node, source).to_string()),
        "qualified_type" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string()),
        "generic_type" => base_type_name(node.child_by_field_name("type")?, source),
        "pointer_type" | "parenthesized_type" => base_type_name(node.named_child(0)?, source),
        _ => None,
    }
}
