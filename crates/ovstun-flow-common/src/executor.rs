//! The flow executor seam.
//!
//! Managers decide *what* rules exist; a [`FlowExecutor`] owns how each
//! mutation reaches the switch. Each call is an atomic primitive; no
//! multi-rule transactional guarantee is made, so callers must order their
//! calls so that a crash mid-sequence leaves the pipeline dropping rather
//! than misrouting. Every primitive is idempotent and safe to replay.

use async_trait::async_trait;

use crate::error::FlowResult;
use crate::flow::{FlowRule, MatchField};

/// Transport-agnostic flow table mutation primitives.
#[async_trait]
pub trait FlowExecutor: Send {
    /// Installs a rule. Re-adding an identical rule is a no-op; adding a
    /// rule with the same (table, priority, match) replaces the actions.
    async fn add_flow(&mut self, rule: FlowRule) -> FlowResult<()>;

    /// Strict replace: rewrites the action list of every rule in `table`
    /// matched by `matches`; inserts the rule when nothing matches.
    /// Use this for at-most-one-rule-per-key entities (flood groups).
    async fn mod_flow(
        &mut self,
        table: u8,
        matches: Vec<MatchField>,
        actions: String,
    ) -> FlowResult<()>;

    /// Deletes every rule matched by `matches` in `table`, or in all
    /// tables when `table` is `None`. Returns the number of rules
    /// deleted; a miss is a silent no-op, never an error.
    async fn delete_flows(
        &mut self,
        table: Option<u8>,
        matches: Vec<MatchField>,
    ) -> FlowResult<usize>;
}
