use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Change;

/// Changes one attribute on every node directly inside a flat range.
///
/// `old_value: None` adds the attribute, `new_value: None` removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOperation {
    pub range: Range,
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl AttributeOperation {
    pub fn new(
        range: Range,
        key: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            range,
            key: key.into(),
            old_value,
            new_value,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match (&self.old_value, &self.new_value) {
            (None, _) => "addAttribute",
            (Some(_), None) => "removeAttribute",
            (Some(_), Some(_)) => "changeAttribute",
        }
    }

    pub fn reversed(&self) -> AttributeOperation {
        AttributeOperation {
            range: self.range.clone(),
            key: self.key.clone(),
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }

    pub(crate) fn execute(&self, doc: &mut Document) -> ModelResult<Change> {
        if !self.range.is_flat() {
            return Err(ModelError::RangeNotFlat {
                start: self.range.start.clone(),
                end: self.range.end.clone(),
            });
        }

        let parent = doc
            .resolve_parent(&self.range.start)
            .ok_or_else(|| ModelError::invalid_position(&self.range.start))?;

        let offset = self.range.start.offset();
        let how_many = self.range.how_many();
        let max_offset = doc.tree().max_offset(parent);

        if offset + how_many > max_offset {
            return Err(ModelError::NodesDoNotExist {
                offset,
                how_many,
                max_offset,
            });
        }

        for (_, _, current) in doc.tree().attribute_runs(parent, offset, how_many, &self.key) {
            if self.old_value.is_some() && current != self.old_value {
                return Err(ModelError::AttributeWrongOldValue {
                    key: self.key.clone(),
                });
            }

            if self.old_value.is_none() && self.new_value.is_some() && current.is_some() {
                return Err(ModelError::AttributeAlreadyExists {
                    key: self.key.clone(),
                });
            }
        }

        doc.tree_mut()
            .set_attribute_in(parent, offset, how_many, &self.key, self.new_value.as_ref());

        Ok(Change::Attribute {
            range: self.range.clone(),
            key: self.key.clone(),
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
        })
    }
}
