//! Agent profiles and the workload-aware agent directory.
//!
//! Workload is never stored as a counter. It is always the number of
//! PENDING/ACKNOWLEDGED assignments held by the agent, computed from the
//! assignment store; the directory only caches that derivation for a short time.

pub mod directory;
pub mod types;

pub use directory::AgentDirectory;
pub use types::{AgentFilter, AgentProfile, AgentProfilePatch, AgentSnapshot, AgentWorkload};
