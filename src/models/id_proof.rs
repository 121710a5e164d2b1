use super::{default_true, trim, Model};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A kind of identity document users can verify with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IdProof {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Model for IdProof {
    const COLLECTION: &'static str = "id_proofs";

    fn normalize(&mut self) {
        trim(&mut self.title);
    }
}
