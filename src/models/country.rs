use super::{trim, trim_opt, IndexSpec, Model};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Country {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(equal = 2))]
    pub iso2: Option<String>,
    #[serde(default)]
    #[validate(length(equal = 3))]
    pub iso3: Option<String>,
    #[serde(default)]
    pub phone_code: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub currency_name: Option<String>,
    #[serde(default)]
    pub currency_symbol: Option<String>,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub emoji: Option<String>,
}

impl Model for Country {
    const COLLECTION: &'static str = "countries";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[IndexSpec::secondary(&["name"])];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        trim_opt(&mut self.iso2);
        trim_opt(&mut self.iso3);
        trim_opt(&mut self.phone_code);
        if let Some(code) = self.phone_code.as_mut() {
            if !code.starts_with('+') {
                code.insert(0, '+');
            }
        }
        self.iso2 = self.iso2.take().map(|c| c.to_uppercase());
        self.iso3 = self.iso3.take().map(|c| c.to_uppercase());
    }
}
