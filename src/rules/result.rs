//! The verdict threaded through a rule chain.

use crate::scene::{Command, EntityId};

/// Rollback granularity the caller applies when a transaction is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rollback {
    #[default]
    None,
    /// Undo back to the state before the whole transaction started.
    ResetToStartAllCommands,
    /// Discard every command of the transaction, including queued ones.
    ClearAllCommands,
}

/// Non-blocking severity attached to the verdict, used to surface warnings
/// during transient drags without rejecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    #[default]
    None,
    Severe,
}

/// Accumulated outcome of a rule chain.
///
/// `result` reports whether the most recent rule's condition held and is
/// freely overwritten as the chain advances. `approved` is a one-way latch:
/// it starts true and only [`reject`](Evaluation::reject) can change it, so
/// no later rule can approve a transaction an inviolable rule has rejected.
#[derive(Debug)]
pub struct Evaluation {
    /// Did the last-evaluated rule's condition hold.
    pub result: bool,
    approved: bool,
    rollback: Rollback,
    severity: Severity,
    issued: Vec<Command>,
}

impl Default for Evaluation {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluation {
    pub fn new() -> Self {
        Self {
            result: true,
            approved: true,
            rollback: Rollback::None,
            severity: Severity::None,
            issued: Vec::new(),
        }
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn rollback(&self) -> Rollback {
        self.rollback
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Reject the transaction. The first rejection's rollback action wins.
    pub fn reject(&mut self, rollback: Rollback) {
        if self.approved {
            self.approved = false;
            self.rollback = rollback;
        }
    }

    /// Raise the severity; it never lowers.
    pub fn escalate(&mut self, severity: Severity) {
        if severity > self.severity {
            self.severity = severity;
        }
    }

    /// Queue a side-effect command for the external command processor.
    pub fn issue(&mut self, command: Command) {
        self.issued.push(command);
    }

    pub fn issued(&self) -> &[Command] {
        &self.issued
    }

    pub fn take_issued(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.issued)
    }

    /// Whether a removal of `id` is already queued, for cascade dedup.
    pub fn removal_scheduled(&self, id: EntityId) -> bool {
        self.issued
            .iter()
            .any(|c| c.is_removal() && c.entity() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_defaults() {
        let eval = Evaluation::new();
        assert!(eval.result);
        assert!(eval.approved());
        assert_eq!(eval.rollback(), Rollback::None);
        assert_eq!(eval.severity(), Severity::None);
        assert!(eval.issued().is_empty());
    }

    #[test]
    fn test_reject_is_one_way() {
        let mut eval = Evaluation::new();
        eval.reject(Rollback::ResetToStartAllCommands);
        assert!(!eval.approved());
        assert_eq!(eval.rollback(), Rollback::ResetToStartAllCommands);

        // A second rejection cannot change the recorded rollback.
        eval.reject(Rollback::ClearAllCommands);
        assert_eq!(eval.rollback(), Rollback::ResetToStartAllCommands);
    }

    #[test]
    fn test_severity_never_lowers() {
        let mut eval = Evaluation::new();
        eval.escalate(Severity::Severe);
        eval.escalate(Severity::None);
        assert_eq!(eval.severity(), Severity::Severe);
    }

    #[test]
    fn test_removal_scheduling() {
        let mut eval = Evaluation::new();
        eval.issue(Command::Remove {
            entity: EntityId(7),
            bypass_rules: true,
        });
        eval.issue(Command::Move {
            entity: EntityId(8),
            start: DVec3::ZERO,
            end: DVec3::X,
            transient: false,
        });
        assert!(eval.removal_scheduled(EntityId(7)));
        // A queued move does not count as a scheduled removal.
        assert!(!eval.removal_scheduled(EntityId(8)));
    }
}
