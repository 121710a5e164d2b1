use super::{trim, Model};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Faq {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    #[validate(length(min = 1, max = 2000))]
    pub answer: String,
}

impl Model for Faq {
    const COLLECTION: &'static str = "faqs";

    fn normalize(&mut self) {
        trim(&mut self.question);
        trim(&mut self.answer);
    }
}
