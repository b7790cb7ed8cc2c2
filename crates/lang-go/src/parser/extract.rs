use super::types::{base_type_name, resolve_type_shape, struct_field_declarations};
use super::{ParsedFile, node_text};
use std::collections::HashMap;
use structscope_api::{Edge, Field, File, Function, Method, Node as RefNode, Parameter, Struct, TypeRef};
use tree_sitter::Node;

/// Everything one file contributes to the model.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub file: File,
    /// Edges whose target file is not resolved yet.
    pub edges: Vec<Edge>,
    pub functions: Vec<Function>,
    /// Methods whose receiver is not a struct declared in this file, keyed by
    /// receiver type name. Go allows them in any file of the package.
    pub detached_methods: Vec<(String, Method)>,
}

/// Walks the top-level declarations of one parsed file.
///
/// Structs are collected first and methods attached afterwards, so a method
/// declared above its receiver type is still attached.
pub fn extract_file(parsed: &ParsedFile) -> FileExtraction {
    let source = parsed.source.as_str();
    let root = parsed.tree.root_node();
    let mut out = FileExtraction {
        file: File {
            name: parsed.name.clone(),
            structs: Vec::new(),
        },
        ..Default::default()
    };

    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut cursor = root.walk();
    let top_level: Vec<Node> = root.named_children(&mut cursor).collect();

    // Pass 1: struct declarations
    for decl in top_level.iter().filter(|n| n.kind() == "type_declaration") {
        for (name, struct_node) in struct_specs(*decl, source) {
            let (st, edges) = extract_struct(&name, struct_node, parsed);
            out.edges.extend(edges);
            by_name.entry(name).or_insert(out.file.structs.len());
            out.file.structs.push(st);
        }
    }

    // Pass 2: methods and free functions
    for decl in &top_level {
        match decl.kind() {
            "method_declaration" => {
                let Some(receiver) = receiver_type_name(*decl, source) else {
                    continue;
                };
                let Some(name) = decl.child_by_field_name("name") else {
                    continue;
                };
                let method = Method {
                    name: node_text(name, source).to_string(),
                    return_types: result_types(*decl, source, &parsed.package),
                };
                match by_name.get(&receiver) {
                    Some(&idx) => out.file.structs[idx].methods.push(method),
                    None => out.detached_methods.push((receiver, method)),
                }
            }
            "function_declaration" => {
                let Some(name) = decl.child_by_field_name("name") else {
                    continue;
                };
                out.functions.push(Function {
                    name: node_text(name, source).to_string(),
                    package: parsed.package.clone(),
                    file: parsed.name.clone(),
                    parameters: parameters(*decl, source, &parsed.package),
                    return_types: result_types(*decl, source, &parsed.package),
                });
            }
            _ => {}
        }
    }

    out
}

/// `(name, struct_type node)` for every struct spec of a `type` declaration.
pub(crate) fn struct_specs<'t>(decl: Node<'t>, source: &str) -> Vec<(String, Node<'t>)> {
    let mut cursor = decl.walk();
    decl.named_children(&mut cursor)
        .filter(|spec| spec.kind() == "type_spec")
        .filter_map(|spec| {
            let ty = spec.child_by_field_name("type")?;
            if ty.kind() != "struct_type" {
                return None;
            }
            let name = spec.child_by_field_name("name")?;
            Some((node_text(name, source).to_string(), ty))
        })
        .collect()
}

fn extract_struct(name: &str, struct_node: Node, parsed: &ParsedFile) -> (Struct, Vec<Edge>) {
    let source = parsed.source.as_str();
    let mut st = Struct::new(name);
    let mut edges = Vec::new();

    for decl in struct_field_declarations(struct_node) {
        let Some(type_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let shape = resolve_type_shape(type_node, source, &parsed.package);
        let tag = decl
            .child_by_field_name("tag")
            .map(|t| node_text(t, source).to_string());

        let mut cursor = decl.walk();
        let names: Vec<String> = decl
            .children_by_field_name("name", &mut cursor)
            .map(|n| node_text(n, source).to_string())
            .collect();

        let fields: Vec<Field> = if names.is_empty() {
            // Embedded field: `Base`, `*Base`, `pkg.Base`
            let Some(base) = base_type_name(type_node, source) else {
                continue;
            };
            let pointer = decl.child(0).is_some_and(|c| c.kind() == "*");
            let literal = if pointer {
                format!("*{}", node_text(type_node, source))
            } else {
                node_text(type_node, source).to_string()
            };
            vec![Field {
                name: base,
                type_ref: TypeRef::new(literal, shape.names.clone()),
                tag,
                embedded: true,
            }]
        } else {
            names
                .into_iter()
                .map(|field_name| Field {
                    name: field_name,
                    type_ref: TypeRef::new(node_text(type_node, source), shape.names.clone()),
                    tag: tag.clone(),
                    embedded: false,
                })
                .collect()
        };

        for field in fields {
            for target in &shape.targets {
                edges.push(Edge {
                    from: RefNode {
                        field_type_name: field.name.clone(),
                        struct_name: name.to_string(),
                        package_name: parsed.package.clone(),
                        file_name: parsed.name.clone(),
                    },
                    to: target.clone(),
                });
            }
            st.fields.push(field);
        }
    }

    (st, edges)
}

/// Base type of a method receiver: `(s *Store)` and `(s Store[T])` → `Store`.
pub(crate) fn receiver_type_name(method: Node, source: &str) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    base_type_name(param.child_by_field_name("type")?, source)
}

fn type_ref_of(param: Node, source: &str, package: &str) -> Option<TypeRef> {
    let ty = param.child_by_field_name("type")?;
    let shape = resolve_type_shape(ty, source, package);
    let literal = if param.kind() == "variadic_parameter_declaration" {
        format!("...{}", node_text(ty, source))
    } else {
        node_text(ty, source).to_string()
    };
    Some(TypeRef::new(literal, shape.names))
}

fn declared_params(list: Node) -> Vec<Node> {
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|c| {
            matches!(
                c.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            )
        })
        .collect()
}

fn param_names(param: Node, source: &str) -> Vec<String> {
    let mut cursor = param.walk();
    param
        .children_by_field_name("name", &mut cursor)
        .map(|n| node_text(n, source).to_string())
        .collect()
}

/// One entry per parameter name; unnamed parameters get an empty name.
fn parameters(func: Node, source: &str, package: &str) -> Vec<Parameter> {
    let Some(list) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut params = Vec::new();
    for param in declared_params(list) {
        let Some(type_ref) = type_ref_of(param, source, package) else {
            continue;
        };
        let names = param_names(param, source);
        if names.is_empty() {
            params.push(Parameter {
                name: String::new(),
                type_ref,
            });
        } else {
            params.extend(names.into_iter().map(|name| Parameter {
                name,
                type_ref: type_ref.clone(),
            }));
        }
    }
    params
}

/// One entry per result slot: `(a, b int, err error)` yields three.
fn result_types(func: Node, source: &str, package: &str) -> Vec<TypeRef> {
    let Some(result) = func.child_by_field_name("result") else {
        return Vec::new();
    };
    if result.kind() != "parameter_list" {
        let shape = resolve_type_shape(result, source, package);
        return vec![TypeRef::new(node_text(result, source), shape.names)];
    }

    let mut types = Vec::new();
    for param in declared_params(result) {
        let Some(type_ref) = type_ref_of(param, source, package) else {
            continue;
        };
        let slots = param_names(param, source).len().max(1);
        types.extend(std::iter::repeat_n(type_ref, slots));
    }
    types
}
