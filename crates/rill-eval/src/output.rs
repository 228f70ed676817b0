//! Read-only projection of finished structure values for rendering hosts.
//!
//! The renderer consumes evaluated structure values by their structural
//! type tag — `phrase` for styled text, `group` for nested arrangements —
//! and never mutates values or re-enters the evaluator. Anything else
//! projects to nothing.

use rust_decimal::Decimal;

use crate::value::Value;

/// A node in the projected render tree.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputNode {
    /// A piece of styled text.
    Phrase {
        text: String,
        size: Option<Decimal>,
        font: Option<String>,
    },
    /// An arrangement of child outputs.
    Group { children: Vec<OutputNode> },
}

/// Project a value to an output node by its structural tag. Values that
/// are not `phrase` or `group` structures project to `None`.
pub fn to_output(value: &Value) -> Option<OutputNode> {
    let Value::Structure { name, fields, .. } = value else {
        return None;
    };
    match name.as_str() {
        "phrase" => {
            let text = match fields.get("text") {
                Some(Value::Text(text)) => text.clone(),
                _ => return None,
            };
            let size = match fields.get("size") {
                Some(Value::Measurement(size, _)) => Some(*size),
                _ => None,
            };
            let font = match fields.get("font") {
                Some(Value::Text(font)) => Some(font.clone()),
                _ => None,
            };
            Some(OutputNode::Phrase { text, size, font })
        }
        "group" => {
            let children = match fields.get("content") {
                Some(Value::List(items)) => to_output_list(items)?,
                _ => Vec::new(),
            };
            Some(OutputNode::Group { children })
        }
        _ => None,
    }
}

/// Project a list of values; any unprojectable element fails the whole
/// list, so hosts never render partial output.
pub fn to_output_list(values: &[Value]) -> Option<Vec<OutputNode>> {
    values.iter().map(to_output).collect()
}

/// Serialize an output tree for hosts that consume JSON.
pub fn output_to_json(node: &OutputNode) -> serde_json::Value {
    match node {
        OutputNode::Phrase { text, size, font } => {
            let mut map = serde_json::Map::new();
            map.insert("kind".into(), serde_json::Value::String("phrase".into()));
            map.insert("text".into(), serde_json::Value::String(text.clone()));
            if let Some(size) = size {
                map.insert("size".into(), serde_json::json!(size.to_string()));
            }
            if let Some(font) = font {
                map.insert("font".into(), serde_json::Value::String(font.clone()));
            }
            serde_json::Value::Object(map)
        }
        OutputNode::Group { children } => {
            serde_json::json!({
                "kind": "group",
                "content": children.iter().map(output_to_json).collect::<Vec<_>>(),
            })
        }
    }
}
