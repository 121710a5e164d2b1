use super::{trim, trim_opt, validate_slug, IndexSpec, Model};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default)]
    pub trending: bool,
}

impl Model for Blog {
    const COLLECTION: &'static str = "blogs";

    fn indexes() -> &'static [IndexSpec] {
        const INDEXES: &[IndexSpec] = &[
            IndexSpec::unique(&["slug"]),
            IndexSpec::secondary(&["trending"]),
        ];
        INDEXES
    }

    fn normalize(&mut self) {
        trim(&mut self.title);
        trim(&mut self.slug);
        self.slug = self.slug.to_lowercase();
        trim_opt(&mut self.image);
        self.tags.iter_mut().for_each(trim);
        self.tags.retain(|t| !t.is_empty());
        self.tags.dedup();
    }
}
