//! Storage collaborators
//!
//! The simulator persists three kinds of data: raw activity rows (records and
//! their meta), per-student aggregate state and the ledger slot. The traits in
//! [`traits`] describe those collaborators, [`transaction`] provides scoped
//! transaction acquisition on top of them and [`memory`] is a complete
//! in-memory backend that can be persisted to a JSON state file.

pub mod memory;
pub mod records;
pub mod traits;
pub mod transaction;

pub use memory::MemoryStore;
pub use records::*;
pub use traits::*;
pub use transaction::{run_in_transaction, Transaction};
