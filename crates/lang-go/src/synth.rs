//! Regenerates struct and method declarations from an edited [`File`] and
//! splices them into the original file text.

use crate::error::SynthesisError;
use crate::parser::extract::{receiver_type_name, struct_specs};
use crate::parser::{GoParser, ParsedFile, first_error, node_text};
use std::collections::{HashMap, HashSet};
use structscope_api::{File, Method, Struct};
use tree_sitter::Node;

/// `(receiver type, method name)`.
pub type MethodKey = (String, String);

const RECEIVER: &str = "s";
const PROBE_PREFIX: &str = "package probe\n\ntype _ ";
const TAG_PREFIX: &str = "package probe\n\nvar _ = ";

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Package,
    Import,
    Other,
}

struct Item {
    kind: ItemKind,
    text: String,
}

/// Top-level items that survive struct removal, in source order.
struct Layout {
    package: Option<Item>,
    body: Vec<Item>,
    /// Whether the first declaration after the package clause survived.
    first_decl: Option<FirstDecl>,
    declared_methods: HashSet<MethodKey>,
    /// Type parameter lists of the file's generic structs, by struct name.
    type_params: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstDecl {
    Import,
    Kept,
    Removed,
}

enum TypeDecl {
    Keep,
    Drop,
    Rewrite(String),
}

/// Where a same-line trailing comment goes.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Package,
    Body(usize),
    Dropped,
}

struct LastItem {
    slot: Slot,
    end_byte: usize,
    end_row: usize,
}

/// Produces the new text for `original` with its structs replaced by those of
/// `edited`.
///
/// Methods already declared in the file, or listed in `declared_elsewhere`,
/// keep their existing declarations; every other method gets an empty stub.
pub fn synthesize_file(
    parser: &GoParser,
    edited: &File,
    original: &ParsedFile,
    declared_elsewhere: &HashSet<MethodKey>,
) -> Result<String, SynthesisError> {
    let layout = layout(original);

    let mut generated = Vec::new();
    for st in &edited.structs {
        let params = layout.type_params.get(&st.name).map(String::as_str);
        generated.push(render_struct(parser, st, params)?);
        for method in &st.methods {
            let key = (st.name.clone(), method.name.clone());
            if layout.declared_methods.contains(&key) || declared_elsewhere.contains(&key) {
                continue;
            }
            generated.push(render_stub(parser, &st.name, method)?);
        }
    }

    let insert_at = match layout.first_decl {
        Some(FirstDecl::Import) => layout
            .body
            .iter()
            .take_while(|item| item.kind == ItemKind::Import)
            .count(),
        Some(FirstDecl::Kept) => 1.min(layout.body.len()),
        Some(FirstDecl::Removed) | None => 0,
    };

    let mut parts: Vec<&str> = Vec::with_capacity(layout.body.len() + generated.len() + 1);
    if let Some(package) = &layout.package {
        parts.push(&package.text);
    }
    parts.extend(layout.body[..insert_at].iter().map(|i| i.text.as_str()));
    parts.extend(generated.iter().map(String::as_str));
    parts.extend(layout.body[insert_at..].iter().map(|i| i.text.as_str()));

    let mut text = parts.join("\n\n");
    text.push('\n');

    let tree = parser.parse(&text).ok_or_else(|| SynthesisError::InvalidOutput {
        file: edited.name.clone(),
        message: "parser produced no tree".to_string(),
    })?;
    if let Some(bad) = first_error(tree.root_node()) {
        let at = bad.start_position();
        return Err(SynthesisError::InvalidOutput {
            file: edited.name.clone(),
            message: format!("syntax error at {}:{}", at.row + 1, at.column + 1),
        });
    }

    Ok(text)
}

/// Methods declared in `parsed`, keyed by receiver type.
pub fn declared_methods(parsed: &ParsedFile) -> HashSet<MethodKey> {
    let source = parsed.source.as_str();
    let root = parsed.tree.root_node();
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| n.kind() == "method_declaration")
        .filter_map(|n| {
            let name = n.child_by_field_name("name")?;
            Some((receiver_type_name(n, source)?, node_text(name, source).to_string()))
        })
        .collect()
}

/// Whether `literal` is exactly one Go type expression.
pub fn is_type_expression(parser: &GoParser, literal: &str) -> bool {
    if literal.is_empty() {
        return false;
    }
    let probe = format!("{}{}\n", PROBE_PREFIX, literal);
    let Some(tree) = parser.parse(&probe) else {
        return false;
    };
    let root = tree.root_node();
    if root.has_error() {
        return false;
    }

    let mut cursor = root.walk();
    let decls: Vec<Node> = root.named_children(&mut cursor).collect();
    if decls.len() != 2 || decls[1].kind() != "type_declaration" {
        return false;
    }
    let mut cursor = decls[1].walk();
    let specs: Vec<Node> = decls[1].named_children(&mut cursor).collect();
    if specs.len() != 1
        || specs[0].kind() != "type_spec"
        || specs[0].child_by_field_name("type_parameters").is_some()
    {
        return false;
    }
    specs[0].child_by_field_name("type").is_some_and(|ty| {
        ty.start_byte() == PROBE_PREFIX.len() && ty.end_byte() == PROBE_PREFIX.len() + literal.len()
    })
}

/// Whether `name` can be declared as a Go identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphabetic() || c.is_numeric())
        && !KEYWORDS.contains(&name)
}

/// Whether `tag` is exactly one raw or interpreted string literal.
pub fn is_string_literal(parser: &GoParser, tag: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    let probe = format!("{}{}\n", TAG_PREFIX, tag);
    let Some(tree) = parser.parse(&probe) else {
        return false;
    };
    let root = tree.root_node();
    if root.has_error() {
        return false;
    }
    let (start, end) = (TAG_PREFIX.len(), TAG_PREFIX.len() + tag.len());
    root.descendant_for_byte_range(start, end).is_some_and(|node| {
        matches!(node.kind(), "raw_string_literal" | "interpreted_string_literal")
            && node.start_byte() == start
            && node.end_byte() == end
    })
}

fn checked_name<'a>(name: &'a str, context: impl FnOnce() -> String) -> Result<&'a str, SynthesisError> {
    if is_identifier(name) {
        Ok(name)
    } else {
        Err(SynthesisError::InvalidName {
            name: name.to_string(),
            context: context(),
        })
    }
}

fn checked_tag<'a>(
    parser: &GoParser,
    tag: &'a str,
    context: impl FnOnce() -> String,
) -> Result<&'a str, SynthesisError> {
    let trimmed = tag.trim();
    if is_string_literal(parser, trimmed) {
        Ok(trimmed)
    } else {
        Err(SynthesisError::InvalidTag {
            tag: tag.to_string(),
            context: context(),
        })
    }
}

fn checked_type<'a>(
    parser: &GoParser,
    literal: &'a str,
    context: impl FnOnce() -> String,
) -> Result<&'a str, SynthesisError> {
    let trimmed = literal.trim();
    if is_type_expression(parser, trimmed) {
        Ok(trimmed)
    } else {
        Err(SynthesisError::InvalidType {
            literal: literal.to_string(),
            context: context(),
        })
    }
}

fn render_struct(
    parser: &GoParser,
    st: &Struct,
    type_params: Option<&str>,
) -> Result<String, SynthesisError> {
    let name = checked_name(&st.name, || "struct".to_string())?;
    let head = format!("type {}{}", name, type_params.unwrap_or_default());
    if st.fields.is_empty() {
        return Ok(format!("{} struct{{}}", head));
    }
    let mut out = format!("{} struct {{\n", head);
    for field in &st.fields {
        let literal = checked_type(parser, &field.type_ref.literal, || {
            format!("field {}.{}", st.name, field.name)
        })?;
        out.push('\t');
        if !field.embedded {
            out.push_str(checked_name(&field.name, || format!("field of {}", st.name))?);
            out.push(' ');
        }
        out.push_str(literal);
        if let Some(tag) = &field.tag {
            let tag = checked_tag(parser, tag, || format!("field {}.{}", st.name, field.name))?;
            out.push(' ');
            out.push_str(tag);
        }
        out.push('\n');
    }
    out.push('}');
    Ok(out)
}

fn render_stub(parser: &GoParser, struct_name: &str, method: &Method) -> Result<String, SynthesisError> {
    let name = checked_name(&method.name, || format!("method of {}", struct_name))?;
    let mut results = Vec::with_capacity(method.return_types.len());
    for (slot, ret) in method.return_types.iter().enumerate() {
        results.push(checked_type(parser, &ret.literal, || {
            format!("result {} of {}.{}", slot, struct_name, method.name)
        })?);
    }
    let result = match results.len() {
        0 => String::new(),
        1 => format!(" {}", results[0]),
        _ => format!(" ({})", results.join(", ")),
    };
    Ok(format!(
        "func ({} *{}) {}(){} {{\n}}",
        RECEIVER, struct_name, name, result
    ))
}

fn layout(original: &ParsedFile) -> Layout {
    let source = original.source.as_str();
    let root = original.tree.root_node();

    let mut package: Option<Item> = None;
    let mut body: Vec<Item> = Vec::new();
    let mut type_params = HashMap::new();
    let mut first_decl = None;
    // Comments attach to the next item; a comment on the same line as the
    // previous item stays with it.
    let mut pending: Option<usize> = None;
    let mut last: Option<LastItem> = None;

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        if node.kind() == "comment" {
            if pending.is_none() {
                if let Some(prev) = last.as_mut() {
                    if node.start_position().row == prev.end_row {
                        let trailing = &source[prev.end_byte..node.end_byte()];
                        match prev.slot {
                            Slot::Package => {
                                if let Some(package) = package.as_mut() {
                                    package.text.push_str(trailing);
                                }
                            }
                            Slot::Body(idx) => body[idx].text.push_str(trailing),
                            Slot::Dropped => {}
                        }
                        prev.end_byte = node.end_byte();
                        prev.end_row = node.end_position().row;
                        continue;
                    }
                }
            }
            pending.get_or_insert(node.start_byte());
            continue;
        }

        let start = pending.take().unwrap_or(node.start_byte());
        let lead = &source[start..node.start_byte()];
        let whole = &source[start..node.end_byte()];

        let (kind, text) = match node.kind() {
            "package_clause" => {
                package = Some(Item {
                    kind: ItemKind::Package,
                    text: whole.to_string(),
                });
                last = Some(LastItem {
                    slot: Slot::Package,
                    end_byte: node.end_byte(),
                    end_row: node.end_position().row,
                });
                continue;
            }
            "import_declaration" => (ItemKind::Import, Some(whole.to_string())),
            "type_declaration" => {
                type_params.extend(struct_type_params(node, source));
                match type_decl(node, source) {
                    TypeDecl::Keep => (ItemKind::Other, Some(whole.to_string())),
                    TypeDecl::Drop => (ItemKind::Other, None),
                    TypeDecl::Rewrite(text) => (ItemKind::Other, Some(format!("{}{}", lead, text))),
                }
            }
            _ => (ItemKind::Other, Some(whole.to_string())),
        };

        if first_decl.is_none() {
            first_decl = Some(match (&text, kind) {
                (None, _) => FirstDecl::Removed,
                (Some(_), ItemKind::Import) => FirstDecl::Import,
                (Some(_), _) => FirstDecl::Kept,
            });
        }

        let slot = match text {
            Some(text) => {
                body.push(Item { kind, text });
                Slot::Body(body.len() - 1)
            }
            None => Slot::Dropped,
        };
        last = Some(LastItem {
            slot,
            end_byte: node.end_byte(),
            end_row: node.end_position().row,
        });
    }

    if let Some(start) = pending {
        let tail = source[start..].trim_end();
        if !tail.is_empty() {
            body.push(Item {
                kind: ItemKind::Other,
                text: tail.to_string(),
            });
        }
    }

    Layout {
        package,
        body,
        first_decl,
        declared_methods: declared_methods(original),
        type_params,
    }
}

fn struct_type_params(decl: Node, source: &str) -> Vec<(String, String)> {
    let mut cursor = decl.walk();
    decl.named_children(&mut cursor)
        .filter(|spec| spec.kind() == "type_spec")
        .filter(|spec| {
            spec.child_by_field_name("type")
                .is_some_and(|ty| ty.kind() == "struct_type")
        })
        .filter_map(|spec| {
            let name = spec.child_by_field_name("name")?;
            let params = spec.child_by_field_name("type_parameters")?;
            Some((node_text(name, source).to_string(), node_text(params, source).to_string()))
        })
        .collect()
}

fn type_decl(node: Node, source: &str) -> TypeDecl {
    let structs = struct_specs(node, source).len();
    if structs == 0 {
        return TypeDecl::Keep;
    }

    let mut cursor = node.walk();
    let remaining: Vec<&str> = node
        .named_children(&mut cursor)
        .filter(|spec| matches!(spec.kind(), "type_spec" | "type_alias"))
        .filter(|spec| {
            spec.child_by_field_name("type")
                .is_none_or(|ty| ty.kind() != "struct_type")
        })
        .map(|spec| node_text(spec, source))
        .collect();

    if remaining.is_empty() {
        return TypeDecl::Drop;
    }
    let specs: Vec<String> = remaining.iter().map(|s| format!("\t{}", s)).collect();
    TypeDecl::Rewrite(format!("type (\n{}\n)", specs.join("\n")))
}
