//! # daomig-ledger
//!
//! Durable bookkeeping for resumable migrations.
//!
//! [`DeploymentState`] records what a run has already done; [`store`] saves it
//! atomically after every confirmed effect and guards it with a [`RunLock`].
//! [`MigrationRecord`] is the long-lived output that later runs consult for reuse.

pub mod error;
pub mod record;
pub mod state;
pub mod store;

pub use error::LedgerError;
pub use record::{BaseEntry, DaoRecord, MigrationRecord, NamedAddress, NetworkRecord};
pub use state::{
    Counter, DeploymentState, FoundersProgress, ManualInstanceProgress, ModuleRegistration,
    Stage, StandAloneRecord, STATE_FORMAT_VERSION,
};
pub use store::RunLock;
