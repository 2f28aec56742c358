//! API Request and Response Types

// Object types
mod object;
pub use object::*;

// Batch types
mod batch;
pub use batch::*;

// Tenant types
mod tenant;
pub use tenant::*;
