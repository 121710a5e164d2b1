use super::{trim, trim_opt, IndexSpec, Model, RecordId};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A state or province within a country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct State {
    pub country_id: RecordId,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub state_code: Option<String>,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl Model for State {
    const COLLECTION: &'static str = "states";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::secondary(&["country_id"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        trim_opt(&mut self.state_code);
    }
}
