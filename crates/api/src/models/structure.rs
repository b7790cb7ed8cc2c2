use serde::{Deserialize, Serialize};

/// A type expression as written in source, plus the composite types it names.
///
/// `structs` carries bare names (`Thing`), qualified names (`pkg.Thing`) and
/// the opaque markers `interface{}`, `func` and `chan`. Primitive names never
/// appear in it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TypeRef {
    pub literal: String,
    #[serde(default)]
    pub structs: Vec<String>,
}

impl TypeRef {
    pub fn new(literal: impl Into<String>, structs: Vec<String>) -> Self {
        Self {
            literal: literal.into(),
            structs,
        }
    }

    /// A type that references nothing, e.g. a return slot or parameter.
    pub fn literal(literal: impl Into<String>) -> Self {
        Self::new(literal, Vec::new())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    /// Raw struct tag including its quotes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Anonymous field; `name` then holds the type's base name.
    #[serde(default, skip_serializing_if = "is_false")]
    pub embedded: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            tag: None,
            embedded: false,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    pub name: String,
    #[serde(rename = "returnType", default)]
    pub return_types: Vec<TypeRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Struct {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub methods: Vec<Method>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct File {
    /// Path of the file as discovered under the watched root.
    pub name: String,
    #[serde(default)]
    pub structs: Vec<Struct>,
}

impl File {
    pub fn find_struct(&self, name: &str) -> Option<&Struct> {
        self.structs.iter().find(|s| s.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub files: Vec<File>,
}

impl Package {
    pub fn find_file(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|f| f.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

/// A function declared without a receiver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    pub name: String,
    pub package: String,
    pub file: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "returnType", default)]
    pub return_types: Vec<TypeRef>,
}
