use super::{default_true, trim, Model, IndexSpec, RecordId};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Input widget an attribute is rendered with.
///
/// Stored as its integer code (1-6); any other code is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FieldType {
    Text = 1,
    TextArea = 2,
    Number = 3,
    Dropdown = 4,
    Radio = 5,
    Checkbox = 6,
}

impl FieldType {
    /// Whether the widget picks from a fixed list of values
    pub fn has_choices(self) -> bool {
        matches!(self, FieldType::Dropdown | FieldType::Radio | FieldType::Checkbox)
    }
}

impl TryFrom<u8> for FieldType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => FieldType::Text,
            2 => FieldType::TextArea,
            3 => FieldType::Number,
            4 => FieldType::Dropdown,
            5 => FieldType::Radio,
            6 => FieldType::Checkbox,
            other => return Err(format!("fieldType must be between 1 and 6, got {}", other)),
        })
    }
}

impl From<FieldType> for u8 {
    fn from(ty: FieldType) -> u8 {
        ty as u8
    }
}

/// A custom attribute that listings in a category carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_attribute"))]
pub struct AttributeField {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub field_type: FieldType,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub status: bool,
    pub category_id: RecordId,
}

fn validate_attribute(attr: &AttributeField) -> Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (attr.min_length, attr.max_length) {
        if min > max {
            return Err(ValidationError::new("min_length_exceeds_max_length"));
        }
    }
    if attr.field_type.has_choices() && attr.values.is_empty() {
        return Err(ValidationError::new("choices_required"));
    }
    Ok(())
}

impl Model for AttributeField {
    const COLLECTION: &'static str = "attributes";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::secondary(&["categoryId"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        self.values.iter_mut().for_each(trim);
        self.values.retain(|v| !v.is_empty());
    }
}
