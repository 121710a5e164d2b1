use super::{default_true, trim, Model};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A paid package that features a seller's ads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_pricing"))]
pub struct FeatureAdPackage {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub discount: f64,
    /// Filled in as `price - discount` when omitted
    #[serde(default)]
    pub final_price: Option<f64>,
    #[validate(range(min = 1))]
    pub days: u32,
    #[validate(range(min = 1))]
    pub advertisement_limit: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn validate_pricing(package: &FeatureAdPackage) -> Result<(), ValidationError> {
    if package.discount > package.price {
        return Err(ValidationError::new("discount_exceeds_price"));
    }
    if package.final_price.is_some_and(|p| p < 0.0) {
        return Err(ValidationError::new("negative_final_price"));
    }
    Ok(())
}

impl Model for FeatureAdPackage {
    const COLLECTION: &'static str = "feature_ad_packages";

    fn normalize(&mut self) {
        trim(&mut self.name);
        if self.final_price.is_none() {
            self.final_price = Some(self.price - self.discount);
        }
    }
}
