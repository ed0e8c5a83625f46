pub mod error;
pub mod hierarchy;
pub mod integrity;

pub use error::{HierarchyError, Result};
pub use hierarchy::HierarchyService;
pub use integrity::{closure_violations, ensure_closure_invariants, ClosureViolation};
