//! Pull-based query operators for the Slate database.
//!
//! Every operator reaches storage through the buffer pool's page
//! interface in `strata`; nothing here touches heap files directly.

pub mod aggregate_executor;
pub mod errors;
pub mod executor;
