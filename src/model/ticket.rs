use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A ClickUp task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    #[serde(rename = "name")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl CustomField {
    /// The field value as text, if it carries one.
    ///
    /// ClickUp returns text fields as strings and number fields as numbers;
    /// anything else (null, empty text, dropdown objects) counts as unset.
    pub fn linked_value(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub fn find_field<'a>(fields: &'a [CustomField], name: &str) -> Option<&'a CustomField> {
    fields.iter().find(|f| f.name == name)
}
