use super::{default_true, trim, trim_opt, Model};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Home-page banner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[validate(length(min = 1))]
    pub image: String,
    #[serde(default)]
    #[validate(url)]
    pub redirect_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Model for Banner {
    const COLLECTION: &'static str = "banners";

    fn normalize(&mut self) {
        trim(&mut self.image);
        trim_opt(&mut self.redirect_url);
    }
}
