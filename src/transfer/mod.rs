//! Transfer Orchestrator
//!
//! Moves funds between two accounts of the same currency as one unit of work:
//!
//! ```text
//! validate ─→ BEGIN ─→ transfer row ─→ debit entry ─→ credit entry
//!                          ─→ balance updates (ascending account id) ─→ COMMIT
//!                                  │ any error
//!                                  └──────────────→ ROLLBACK
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Lock Ordering**: the two balance rows are always locked lowest id
//!    first, whatever the transfer direction, so opposite-direction transfers
//!    on the same pair cannot deadlock
//! 2. **All-or-Nothing**: no transfer row, entry or balance change outlives a
//!    failed unit
//! 3. **Zero-Sum**: the two entries of a transfer always sum to zero
//! 4. **No Overdraft**: a debit that leaves the source negative aborts the unit
//!
//! Transfers are not idempotent and never retried internally.

pub mod service;
pub mod types;


pub use service::TransferService;
pub use types::TransferParams;
