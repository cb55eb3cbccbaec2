//! Node stacks: nodes sharing a layout id, competing to be presented.
//!
//! The stack only orders ids. Visual side effects of a lead change (showing
//! the new lead, resuming from the old one, crossfading) are applied by the
//! tree.

use super::NodeId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeStack {
    members: Vec<NodeId>,
    lead: Option<NodeId>,
    prev_lead: Option<NodeId>,
}

impl NodeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    /// The presented member.
    pub fn lead(&self) -> Option<NodeId> {
        self.lead
    }

    /// The member that was lead before the current one.
    pub fn prev_lead(&self) -> Option<NodeId> {
        self.prev_lead
    }

    /// Add `node` and make it lead. Returns the lead it replaced.
    pub fn add(&mut self, node: NodeId) -> Option<NodeId> {
        if !self.contains(node) {
            self.members.push(node);
        }
        self.promote(node)
    }

    /// Move `node` to the tail and make it lead. Returns the lead it replaced,
    /// or `None` if `node` was already lead.
    pub fn promote(&mut self, node: NodeId) -> Option<NodeId> {
        if self.lead == Some(node) {
            return None;
        }
        self.members.retain(|id| *id != node);
        self.members.push(node);
        self.prev_lead = self.lead;
        self.lead = Some(node);
        self.prev_lead
    }

    /// Remove `node`. If it was lead, the new tail becomes lead and is
    /// returned.
    pub fn remove(&mut self, node: NodeId) -> Option<NodeId> {
        self.members.retain(|id| *id != node);
        if self.prev_lead == Some(node) {
            self.prev_lead = None;
        }
        if self.lead != Some(node) {
            return None;
        }
        self.lead = None;
        let next = *self.members.last()?;
        self.promote(next);
        self.prev_lead = None;
        Some(next)
    }

    /// Hand the lead from `node` to another present member, searching
    /// backward from `node` first, then forward. Returns the new lead, or
    /// `None` if `node` is not the lead or no other member can take over.
    pub fn relegate(
        &mut self,
        node: NodeId,
        is_present: impl Fn(NodeId) -> bool,
    ) -> Option<NodeId> {
        if self.lead != Some(node) {
            return None;
        }
        let index = self.members.iter().position(|id| *id == node)?;
        let successor = self.members[..index]
            .iter()
            .rev()
            .chain(self.members[index + 1..].iter())
            .copied()
            .find(|id| is_present(*id))?;
        self.promote(successor);
        Some(successor)
    }
}
