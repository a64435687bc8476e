//! In-memory flow executor for tests.
//!
//! Keeps a real flow table with OpenFlow add/mod/delete semantics, plus a
//! log of every call in `ovs-ofctl` syntax so tests can assert exact call
//! sequences the way the C-side bridge tests assert mock calls.

use async_trait::async_trait;

use crate::error::FlowResult;
use crate::executor::FlowExecutor;
use crate::flow::{render_matches, FlowRule, MatchField, DEFAULT_PRIORITY};

/// Test double implementing [`FlowExecutor`] against a Vec-backed table.
#[derive(Debug, Default)]
pub struct MockFlowExecutor {
    rules: Vec<FlowRule>,
    calls: Vec<String>,
}

impl MockFlowExecutor {
    /// Creates an empty mock executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current flow table contents, in insertion order.
    pub fn flows(&self) -> &[FlowRule] {
        &self.rules
    }

    /// All rules currently installed in `table`.
    pub fn flows_in_table(&self, table: u8) -> Vec<&FlowRule> {
        self.rules.iter().filter(|r| r.table == table).collect()
    }

    /// The captured call log, in call order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Clears the call log without touching the flow table.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn render_delete(table: Option<u8>, matches: &[MatchField]) -> String {
        let mut parts = Vec::new();
        if let Some(table) = table {
            parts.push(format!("table={}", table));
        }
        if let Some(rendered) = render_matches(matches) {
            parts.push(rendered);
        }
        if parts.is_empty() {
            "del-flows".to_string()
        } else {
            format!("del-flows {}", parts.join(","))
        }
    }
}

#[async_trait]
impl FlowExecutor for MockFlowExecutor {
    async fn add_flow(&mut self, rule: FlowRule) -> FlowResult<()> {
        self.calls.push(format!("add-flow {}", rule));
        // OFPFC_ADD: an identical (table, priority, match) entry is
        // replaced, never duplicated.
        self.rules.retain(|r| {
            !(r.table == rule.table && r.priority == rule.priority && r.same_match(&rule.matches))
        });
        self.rules.push(rule);
        Ok(())
    }

    async fn mod_flow(
        &mut self,
        table: u8,
        matches: Vec<MatchField>,
        actions: String,
    ) -> FlowResult<()> {
        let mut call = format!("mod-flows table={}", table);
        if let Some(rendered) = render_matches(&matches) {
            call.push(',');
            call.push_str(&rendered);
        }
        call.push_str(&format!(",actions={}", actions));
        self.calls.push(call);

        let mut modified = false;
        for rule in self
            .rules
            .iter_mut()
            .filter(|r| r.table == table && r.matches_filter(&matches))
        {
            rule.actions = actions.clone();
            modified = true;
        }
        // OFPFC_MODIFY inserts when nothing matched.
        if !modified {
            self.rules
                .push(FlowRule::new(table, DEFAULT_PRIORITY, matches, actions));
        }
        Ok(())
    }

    async fn delete_flows(
        &mut self,
        table: Option<u8>,
        matches: Vec<MatchField>,
    ) -> FlowResult<usize> {
        self.calls.push(Self::render_delete(table, &matches));

        let before = self.rules.len();
        self.rules.retain(|r| {
            let in_scope = table.map_or(true, |t| r.table == t);
            !(in_scope && r.matches_filter(&matches))
        });
        Ok(before - self.rules.len())
    }
}
