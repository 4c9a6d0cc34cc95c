//! Automation proxy and state-reconciliation core for showctl.
//!
//! showctl mediates between a control plane and a stateful production
//! automation application (document → layer → shot hierarchy) that exposes
//! no compiled interface, only a member set discoverable at runtime. This
//! crate holds everything below the transport:
//!
//! - [`bridge`]: the late-binding capability interface and the dispatcher
//! - [`value`]: values and opaque object handles crossing that boundary
//! - [`layers`]: the closed layer and transition-speed tables
//! - [`studio`]: the cursor-holding automation session
//! - [`shots`]: per-call shot resolution on the current layer
//! - [`state`]: snapshot and partial desired-state values
//! - [`reconcile`]: diff-then-command application of a desired state
//! - [`protocol`]: control-plane request/response types
//! - [`error`]: startup, caller, and diagnostic error taxonomy
//! - [`testing`]: an in-memory fake studio for tests and `--fake` runs

pub mod bridge;
pub mod error;
pub mod layers;
pub mod protocol;
pub mod reconcile;
pub mod shots;
pub mod state;
pub mod studio;
pub mod testing;
pub mod value;
