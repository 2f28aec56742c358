//! Service Layer
//!
//! Business logic sits here, between the HTTP handlers and the storage
//! traits. Handlers stay thin and response types stay pure DTOs.

mod object_service;
mod tenant_service;

pub use object_service::*;
pub use tenant_service::*;
