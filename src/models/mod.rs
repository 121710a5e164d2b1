//! # Schema Declarations
//!
//! Record shapes for the application's collections. Each model declares:
//! - required fields (non-`Option`, no serde default: a write without them is rejected)
//! - defaults (`#[serde(default ...)]`)
//! - constraints checked at write (`validator` attributes)
//! - index hints, turned into real indexes by the document store
//!
//! Timestamps and ids are not part of the models; the store adds them.

mod attribute;
mod banner;
mod blog;
mod category;
mod city;
mod country;
mod faq;
mod feature_ad_package;
mod id_proof;
mod role;
mod staff;
mod state;

pub use attribute::{AttributeField, FieldType};
pub use banner::Banner;
pub use blog::Blog;
pub use category::{Category, CategoryTree};
pub use city::City;
pub use country::Country;
pub use faq::Faq;
pub use feature_ad_package::FeatureAdPackage;
pub use id_proof::IdProof;
pub use role::{Action, Permission, Role};
pub use staff::Staff;
pub use state::State;

use crate::error::BazaarResult;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// Identifier of a stored record; also what reference fields hold
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// A fresh random id
    pub fn generate() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// A secondary index over top-level document fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub fields: &'static [&'static str],
    pub unique: bool,
}

impl IndexSpec {
    pub const fn unique(fields: &'static [&'static str]) -> Self {
        Self { fields, unique: true }
    }

    pub const fn secondary(fields: &'static [&'static str]) -> Self {
        Self { fields, unique: false }
    }
}

/// A record shape stored in its own collection
pub trait Model: Serialize + DeserializeOwned + Validate + Send + 'static {
    /// Collection (table) name
    const COLLECTION: &'static str;

    fn indexes() -> &'static [IndexSpec] {
        &[]
    }

    /// Canonicalises fields (trimming, casing, derived values) before validation
    fn normalize(&mut self) {}

    /// Last step before the record is written, after validation passed
    fn before_save(&mut self) -> BazaarResult<()> {
        Ok(())
    }
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

pub(crate) fn trim_opt(value: &mut Option<String>) {
    if let Some(v) = value {
        trim(v);
    }
    if value.as_deref() == Some("") {
        *value = None;
    }
}

lazy_static! {
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Lowercase words joined by single hyphens
pub(crate) fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if SLUG_REGEX.is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}
