use atomic::{Atomic, Ordering};

use crate::fsm::State;

/// Number of FSM states kept for [`crate::Bus::dump_state`].
pub const STATES_HISTORY_SIZE: usize = 8;

/// FSM position of one bus. Written by the ISR and by the task around arming and
/// completion.
///
/// With the `dump` feature the last few states entered are kept as well.
pub struct StateTracker {
    current: Atomic<State>,
    #[cfg(feature = "dump")]
    trail: critical_section::Mutex<
        core::cell::RefCell<heapless::Deque<State, STATES_HISTORY_SIZE>>,
    >,
}

impl StateTracker {
    pub const fn new() -> Self {
        Self {
            current: Atomic::new(State::Idle),
            #[cfg(feature = "dump")]
            trail: critical_section::Mutex::new(core::cell::RefCell::new(heapless::Deque::new())),
        }
    }

    /// Enters the first state of a new transfer.
    pub fn arm(&self) {
        #[cfg(feature = "dump")]
        critical_section::with(|cs| self.trail.borrow_ref_mut(cs).clear());
        self.enter(State::WriteAddressTx);
    }

    pub fn enter(&self, state: State) {
        #[cfg(feature = "dump")]
        critical_section::with(|cs| {
            let mut trail = self.trail.borrow_ref_mut(cs);
            if trail.is_full() {
                trail.pop_front();
            }
            let _ = trail.push_back(state);
        });
        self.current.store(state, Ordering::SeqCst);
    }

    pub fn current(&self) -> State {
        self.current.load(Ordering::SeqCst)
    }

    /// States entered since the last [`arm`](Self::arm), oldest first, right-aligned and
    /// padded with [`State::Idle`].
    #[cfg(feature = "dump")]
    pub fn trail(&self) -> [State; STATES_HISTORY_SIZE] {
        let mut states = [State::Idle; STATES_HISTORY_SIZE];
        critical_section::with(|cs| {
            let trail = self.trail.borrow_ref(cs);
            let start = STATES_HISTORY_SIZE - trail.len();
            for (slot, state) in states[start..].iter_mut().zip(trail.iter()) {
                *slot = *state;
            }
        });
        states
    }
}
