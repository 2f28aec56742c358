//! Batch create types

use serde::{Deserialize, Serialize};

use super::CreateObjectRequest;

pub const ALL_CREATED_MESSAGE: &str = "All keys were successfully created";
pub const DUPLICATES_SKIPPED_MESSAGE: &str =
    "Some keys were not created because they already exist in the database";

/// Request to create several objects in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCreateRequest {
    /// Items, processed in order
    pub items: Vec<CreateObjectRequest>,
}

/// Outcome of a batch create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreateResponse {
    pub message: String,
    /// Keys inserted, in input order
    pub created: Vec<String>,
    /// Keys skipped because they already existed, in input order
    pub duplicates: Vec<String>,
}

impl BatchCreateResponse {
    pub fn new(created: Vec<String>, duplicates: Vec<String>) -> Self {
        let message = if duplicates.is_empty() {
            ALL_CREATED_MESSAGE
        } else {
            DUPLICATES_SKIPPED_MESSAGE
        };
        Self {
            message: message.to_string(),
            created,
            duplicates,
        }
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}
