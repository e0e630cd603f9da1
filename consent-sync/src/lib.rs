//! # consent-sync
//!
//! Keeps the locally stored consent decision and the remote consent endpoint
//! in agreement.
//!
//! Build a [`ConsentCoordinator`] once at the composition root (see
//! [`ConsentCoordinator::from_config`]) and pass it to whatever needs it.
//! [`ConsentCoordinator::initialize_and_reconcile`] handles startup;
//! [`ConsentCoordinator::set_status`] records a new decision.

pub mod coordinator;
pub mod error;
pub mod identity;
pub mod retry;
pub mod sink;

pub use coordinator::{
    ConsentCoordinator, CoordinatorBuilder, PresentationTrigger, PromptRequest, Startup,
    SyncOutcome, SyncTask,
};
pub use error::{IdentifierError, SyncError, TransportError};
pub use identity::{DeviceIdProvider, FixedIdProvider, MachineIdProvider};
pub use retry::RetryPolicy;
pub use sink::{ConsentSink, HttpSink, SinkResponse};
