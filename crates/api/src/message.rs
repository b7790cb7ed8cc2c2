use crate::models::Model;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Messages pushed to a connected observer.
#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum Outbound {
    /// Tells the observer to drop its current layout before the next model.
    Clear {
        #[serde(rename = "clearLayout")]
        clear_layout: bool,
    },
    Model(Arc<Model>),
    Error {
        error: String,
    },
    /// Per-file results of an edit submitted by this observer.
    Edits {
        edits: Vec<EditOutcome>,
    },
}

impl Outbound {
    pub fn clear() -> Self {
        Outbound::Clear { clear_layout: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Outbound::Error {
            error: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub package: String,
    pub file: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditOutcome {
    pub fn written(package: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            file: file.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(package: impl Into<String>, file: impl Into<String>, error: String) -> Self {
        Self {
            package: package.into(),
            file: file.into(),
            ok: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_shapes() {
        let clear = serde_json::to_string(&Outbound::clear()).unwrap();
        assert_eq!(clear, r#"{"clearLayout":true}"#);

        let err = serde_json::to_string(&Outbound::error("boom")).unwrap();
        assert_eq!(err, r#"{"error":"boom"}"#);

        let model = serde_json::to_value(Outbound::Model(Arc::new(Model::empty()))).unwrap();
        assert!(model.get("packages").is_some());

        let edits = Outbound::Edits {
            edits: vec![EditOutcome::written("main", "a.go")],
        };
        let edits = serde_json::to_value(edits).unwrap();
        assert_eq!(edits["edits"][0]["ok"], true);
        assert!(edits["edits"][0].get("error").is_none());
    }
}
