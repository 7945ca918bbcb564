#![deny(missing_docs)]
#![doc = "Error surface, provenance descriptors and the collective layer shared by the QMC reduction crates."]

pub mod comm;
pub mod errors;
pub mod provenance;

pub use comm::{Communicator, ReduceOp, SingleProcess, ThreadComm, ThreadGroup};
pub use errors::{ErrorInfo, QmcError};
pub use provenance::{SchemaVersion, SnapshotProvenance};
