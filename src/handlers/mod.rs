//! HTTP resources. Each module owns its routes and gates them with the
//! permission pair of its resource.

pub mod common;
pub mod crm;
pub mod customers;
pub mod dashboard;
pub mod finance;
pub mod orders;
pub mod pos;
pub mod products;
pub mod projects;
pub mod quotes;
pub mod shell;
pub mod stock;
pub mod suppliers;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
