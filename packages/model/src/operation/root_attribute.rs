use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Change;

/// Changes one attribute of a root element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootAttributeOperation {
    pub root: String,
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl RootAttributeOperation {
    pub fn new(
        root: impl Into<String>,
        key: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            root: root.into(),
            key: key.into(),
            old_value,
            new_value,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match (&self.old_value, &self.new_value) {
            (None, _) => "addRootAttribute",
            (Some(_), None) => "removeRootAttribute",
            (Some(_), Some(_)) => "changeRootAttribute",
        }
    }

    pub fn reversed(&self) -> RootAttributeOperation {
        RootAttributeOperation {
            root: self.root.clone(),
            key: self.key.clone(),
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }

    pub(crate) fn execute(&self, doc: &mut Document) -> ModelResult<Change> {
        let root = doc
            .root_id(&self.root)
            .ok_or_else(|| ModelError::RootNotFound(self.root.clone()))?;

        let current = doc.tree().get_attribute(root, &self.key).cloned();

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

        doc.tree_mut()
            .set_attribute(root, &self.key, self.new_value.as_ref());

        Ok(Change::RootAttribute {
            root: self.root.clone(),
            key: self.key.clone(),
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
        })
    }
}
