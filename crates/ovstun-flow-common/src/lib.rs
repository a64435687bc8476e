//! Common infrastructure for the ovstun OpenFlow bridge managers.
//!
//! This crate provides the pieces shared by every bridge-pipeline manager:
//!
//! - [`flow`]: the `FlowRule`/`MatchField` value model used to describe
//!   every rule a manager installs or deletes
//! - [`executor`]: the `FlowExecutor` trait the managers drive; the real
//!   transport to the switch lives behind it
//! - [`mock`]: an in-memory `FlowExecutor` for tests, with call capture
//!   and OpenFlow add/mod/delete semantics
//! - [`shell`]: safe shell command execution for executors that go
//!   through command-line tooling
//! - [`error`]: error types for flow operations
//!
//! # Architecture
//!
//! Bridge managers follow this pattern:
//!
//! 1. React to topology events (tunnel added, network bound, port plugged)
//! 2. Decide which flow rules implement the new state
//! 3. Issue idempotent add/mod/delete operations through a `FlowExecutor`
//!
//! The managers own *what* rules exist; the executor owns *how* a rule
//! mutation reaches the switch.

pub mod error;
pub mod executor;
pub mod flow;
pub mod mock;
pub mod shell;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{FlowError, FlowResult};
pub use executor::FlowExecutor;
pub use flow::{FlowRule, MatchField, Protocol, DEFAULT_PRIORITY};
pub use mock::MockFlowExecutor;
pub use types::MacAddress;
