//! Business logic services.
//!
//! The assignment engine (selection, reassignment and the use-case facade),
//! the storage port with its in-memory backend, and the HTTP surface.

pub mod api_auth;
pub mod api_routes;
pub mod api_server;
pub mod assignment;
pub mod memory_store;
pub mod reassignment;
pub mod selection;
pub mod store;

pub use assignment::AssignmentService;
pub use memory_store::InMemoryStore;
pub use reassignment::{RebalanceReport, ReassignOutcome, ReassignTrigger, ReassignmentCoordinator};
pub use selection::SelectionPolicy;
pub use store::{ReviewStore, StoreError};
