//! Error types for flow-pipeline operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. Deleting a
//! rule that was never installed is deliberately *not* an error anywhere
//! in this crate: teardown paths must stay idempotent, so a miss on delete
//! is a silent no-op.

use std::io;
use thiserror::Error;

/// Result type alias for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors that can occur while managing a bridge's flow tables.
#[derive(Debug, Error)]
pub enum FlowError {
    /// An install request does not describe a valid rule for the pipeline
    /// (empty action list, or an action targeting a stage that was never
    /// wired, e.g. the ARP responder table while the responder is off).
    #[error("Malformed flow rule: {reason}")]
    MalformedRule {
        /// Why the rule was rejected.
        reason: String,
    },

    /// A local-VLAN mapping request conflicts with an existing mapping.
    /// Both directions must stay unique: one local VLAN per segmentation
    /// ID and one segmentation ID per local VLAN.
    #[error(
        "Local VLAN mapping conflict: segmentation_id {segmentation_id} / local_vlan {local_vlan}"
    )]
    MappingConflict {
        /// The tunnel segmentation ID involved.
        segmentation_id: u64,
        /// The local VLAN tag involved.
        local_vlan: u16,
    },

    /// The external flow executor reported a failure. Propagated to the
    /// caller uninterpreted; replaying the operation is always safe.
    #[error("Flow executor failed during {operation}: {message}")]
    Executor {
        /// The operation that failed ("add-flow", "mod-flows", "del-flows").
        operation: String,
        /// Error message from the executor.
        message: String,
    },

    /// Failed to spawn a shell command (executors that drive CLI tooling).
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },
}

impl FlowError {
    /// Creates a malformed-rule error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRule {
            reason: reason.into(),
        }
    }

    /// Creates an executor error.
    pub fn executor(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Executor {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
