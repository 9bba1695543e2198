//! Per-certificate renewal state machine

use std::fmt;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenewalState {
    Pending,
    CheckingExpiry,
    DryRunSkip,
    Issuing,
    Importing,
    DoneSuccess,
    DoneFailure,
    DoneSkipped,
}

impl RenewalState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RenewalState::DoneSuccess | RenewalState::DoneFailure | RenewalState::DoneSkipped
        )
    }

    pub fn can_transition_to(self, next: RenewalState) -> bool {
        use RenewalState::*;
        match (self, next) {
            (Pending, CheckingExpiry | DryRunSkip | Issuing | DoneFailure) => true,
            (CheckingExpiry, DoneSkipped | DryRunSkip | Issuing | DoneFailure) => true,
            (DryRunSkip, DoneSkipped) => true,
            (Issuing, Importing | DoneFailure) => true,
            (Importing, DoneSuccess | DoneFailure) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RenewalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenewalState::Pending => "pending",
            RenewalState::CheckingExpiry => "checking-expiry",
            RenewalState::DryRunSkip => "dry-run-skip",
            RenewalState::Issuing => "issuing",
            RenewalState::Importing => "importing",
            RenewalState::DoneSuccess => "done-success",
            RenewalState::DoneFailure => "done-failure",
            RenewalState::DoneSkipped => "done-skipped",
        };
        f.write_str(name)
    }
}

/// Current state of one certificate, with every transition traced
#[derive(Debug)]
pub struct RenewalTracker {
    certificate_id: String,
    state: RenewalState,
}

impl RenewalTracker {
    pub fn new(certificate_id: &str) -> Self {
        Self {
            certificate_id: certificate_id.to_string(),
            state: RenewalState::Pending,
        }
    }

    pub fn state(&self) -> RenewalState {
        self.state
    }

    pub fn advance(&mut self, next: RenewalState) {
        if self.state.can_transition_to(next) {
            debug!("{}: {} -> {}", self.certificate_id, self.state, next);
        } else {
            warn!(
                "{}: unexpected transition {} -> {}",
                self.certificate_id, self.state, next
            );
        }
        self.state = next;
    }
}
