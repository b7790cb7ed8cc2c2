use std::hash::Hasher;
use structscope_api::{Model, Struct, TypeRef};
use xxhash_rust::xxh3::Xxh3;

/// Content digest of a [`Model`], used to suppress broadcasts that would not
/// change what observers see.
///
/// Covers packages, files, structs with their ordered fields and methods,
/// and free function signatures. Struct declaration order within a file is
/// ignored; edges are derived from fields and not hashed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(model: &Model) -> Self {
        let mut hasher = Xxh3::new();

        for package in &model.packages {
            write_str(&mut hasher, "package");
            write_str(&mut hasher, &package.name);
            for file in &package.files {
                write_str(&mut hasher, "file");
                write_str(&mut hasher, &file.name);

                let mut structs: Vec<&Struct> = file.structs.iter().collect();
                structs.sort_by(|a, b| a.name.cmp(&b.name));
                for st in structs {
                    write_struct(&mut hasher, st);
                }
            }
        }

        for function in &model.global_functions {
            write_str(&mut hasher, "func");
            write_str(&mut hasher, &function.package);
            write_str(&mut hasher, &function.file);
            write_str(&mut hasher, &function.name);
            for param in &function.parameters {
                write_str(&mut hasher, &param.name);
                write_str(&mut hasher, &param.type_ref.literal);
            }
            write_types(&mut hasher, &function.return_types);
        }

        Self(hasher.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

fn write_struct(hasher: &mut Xxh3, st: &Struct) {
    write_str(hasher, "struct");
    write_str(hasher, &st.name);
    for field in &st.fields {
        write_str(hasher, &field.name);
        write_str(hasher, &field.type_ref.literal);
        write_str(hasher, field.tag.as_deref().unwrap_or(""));
        hasher.write_u8(field.embedded as u8);
    }
    for method in &st.methods {
        write_str(hasher, "method");
        write_str(hasher, &method.name);
        write_types(hasher, &method.return_types);
    }
}

fn write_types(hasher: &mut Xxh3, types: &[TypeRef]) {
    hasher.write_usize(types.len());
    for ty in types {
        write_str(hasher, &ty.literal);
    }
}

// Length prefix keeps ("ab", "c") apart from ("a", "bc").
fn write_str(hasher: &mut Xxh3, value: &str) {
    hasher.write_usize(value.len());
    hasher.write(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use structscope_api::{Field, File, Package};

    fn model(structs: Vec<Struct>) -> Model {
        Model {
            packages: vec![Package {
                name: "main".into(),
                files: vec![File {
                    name: "main.go".into(),
                    structs,
                }],
            }],
            ..Default::default()
        }
    }

    fn with_fields(name: &str, fields: &[(&str, &str)]) -> Struct {
        let mut st = Struct::new(name);
        st.fields = fields
            .iter()
            .map(|(n, t)| Field::new(*n, TypeRef::literal(*t)))
            .collect();
        st
    }

    #[test]
    fn test_struct_order_is_ignored() {
        let a = with_fields("A", &[("x", "int")]);
        let b = with_fields("B", &[("y", "string")]);
        assert_eq!(
            Fingerprint::of(&model(vec![a.clone(), b.clone()])),
            Fingerprint::of(&model(vec![b, a]))
        );
    }

    #[test]
    fn test_field_order_and_types_matter() {
        let base = Fingerprint::of(&model(vec![with_fields("A", &[("x", "int"), ("y", "int")])]));
        let swapped = Fingerprint::of(&model(vec![with_fields("A", &[("y", "int"), ("x", "int")])]));
        let retyped = Fingerprint::of(&model(vec![with_fields("A", &[("x", "int"), ("y", "int64")])]));
        assert_ne!(base, swapped);
        assert_ne!(base, retyped);
    }

    #[test]
    fn test_tag_change_is_visible() {
        let plain = with_fields("A", &[("x", "int")]);
        let mut tagged = plain.clone();
        tagged.fields[0].tag = Some("`json:\"x\"`".to_string());
        assert_ne!(
            Fingerprint::of(&model(vec![plain])),
            Fingerprint::of(&model(vec![tagged]))
        );
    }

    #[test]
    fn test_empty_model_is_stable() {
        assert_eq!(Fingerprint::of(&Model::empty()), Fingerprint::of(&Model::empty()));
    }
}
