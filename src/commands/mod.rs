//! Command handler layer
//!
//! Transport-agnostic handlers the host application binds to its own
//! surface (HTTP routes, IPC commands, whatever it speaks). Every handler
//! takes the shared `LedgerState` plus an account id the host has already
//! authenticated; the ledger only authorizes spend.

pub mod features;
pub mod ledger;
pub mod subscription;

pub use features::*;
pub use ledger::*;
pub use subscription::*;
