//! Cooperative scheduler for one stack instance.
//!
//! A pass runs the three steps in a fixed order (transports, timers, state
//! machine) and repeats while any of them reports work. Fired timers and
//! received messages therefore reach their transactions in the same pass,
//! and whatever a transaction queued for sending leaves on the next round.

use sipwire_transaction_core::TransactionController;
use tracing::trace;

#[derive(Debug)]
pub struct Executive {
    controller: TransactionController,
}

impl Executive {
    pub fn new(controller: TransactionController) -> Self {
        Executive { controller }
    }

    pub fn controller(&self) -> &TransactionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut TransactionController {
        &mut self.controller
    }

    /// Run passes until the stack is idle. Returns whether anything happened.
    pub fn process(&mut self) -> bool {
        let mut did_work = false;
        let mut rounds = 0usize;
        loop {
            let transports = self.process_transport();
            let timers = self.process_timer();
            let state_machine = self.process_state_machine();
            if !(transports || timers || state_machine) {
                break;
            }
            did_work = true;
            rounds += 1;
        }
        if did_work {
            trace!(rounds, "Executive pass complete");
        }
        did_work
    }

    pub fn process_transport(&mut self) -> bool {
        self.controller.process_transports()
    }

    pub fn process_timer(&mut self) -> bool {
        self.controller.process_timers()
    }

    pub fn process_state_machine(&mut self) -> bool {
        self.controller.process_state_machine()
    }
}
