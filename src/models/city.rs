use super::{trim, IndexSpec, Model, RecordId};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct City {
    pub state_id: RecordId,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl Model for City {
    const COLLECTION: &'static str = "cities";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::secondary(&["state_id"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
    }
}
