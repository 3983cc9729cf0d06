use crate::{
    fsm::{Action, State},
    peripheral::I2cPeripheral,
    status::{Interrupts, Status},
    transfer::{Direction, Transfer},
    Error,
};

/// What the interrupt handlers need from a bus.
pub trait InterruptBridge<const N: usize> {
    type Peripheral: I2cPeripheral;

    fn peripheral(&self) -> &Self::Peripheral;

    fn get_state(&self) -> State;

    fn set_state(&self, state: State);

    fn with_transfer<R>(&self, f: impl FnOnce(&mut Transfer<N>) -> R) -> R;

    fn nack_retry_limit(&self) -> u16;

    /// Ends the transfer: interrupts off, STOP, result recorded, waiter woken.
    fn complete(&self, result: Result<(), Error>);

    /// Parks the transfer after a slave-busy NACK so the waiter can issue a new START.
    fn pause(&self);
}

enum Progress {
    Advance,
    Stay,
    Done,
}

/// Event interrupt: advances the state machine by one step.
pub fn handle_event_interrupt<const N: usize, B: InterruptBridge<N>>(bridge: &B) {
    let state = bridge.get_state();
    let Some(transition) = state.transition() else {
        trace!("event interrupt with no transfer armed");
        return;
    };

    let regs = bridge.peripheral();
    let status = regs.status();

    if !transition.expect.matches(status) {
        // Common right after a repeated START.
        trace!(
            "spurious event in {}: {} ({=u32:#x})",
            state,
            status.event(),
            status.bits()
        );
        return;
    }

    let progress = match transition.action {
        Action::SendAddressTx => {
            regs.write_data(bridge.with_transfer(|t| t.write_address()));
            Progress::Advance
        }
        Action::SendRegister => {
            regs.write_data(bridge.with_transfer(|t| t.register_address()));
            if bridge.with_transfer(|t| t.direction()) == Direction::Write {
                regs.enable_interrupts(Interrupts::BUFFER);
            }
            Progress::Advance
        }
        Action::RepeatStart => {
            regs.generate_start();
            Progress::Advance
        }
        Action::SendAddressRx => {
            let (address, size) = bridge.with_transfer(|t| (t.read_address(), t.buffer().size()));
            if size == 1 {
                regs.set_ack(false);
            }
            regs.write_data(address);
            Progress::Advance
        }
        Action::ArmReceive => {
            regs.enable_interrupts(Interrupts::BUFFER);
            Progress::Advance
        }
        Action::ReceiveByte => {
            let byte = regs.read_data();
            let stored = bridge.with_transfer(|t| {
                let buffer = t.buffer_mut();
                buffer.push_byte(byte).map(|()| buffer.remaining())
            });
            match stored {
                Ok(0) => Progress::Done,
                Ok(remaining) => {
                    if remaining == 1 {
                        regs.set_ack(false);
                    }
                    Progress::Stay
                }
                Err(()) => {
                    error!("byte received past the end of the transfer");
                    return bridge.complete(Err(Error::Overrun));
                }
            }
        }
        Action::TransmitByte => {
            let (next, complete) = bridge.with_transfer(|t| {
                let buffer = t.buffer_mut();
                (buffer.next(), buffer.is_complete())
            });
            if let Some(byte) = next {
                regs.write_data(byte);
            }
            if complete {
                regs.disable_interrupts(Interrupts::BUFFER);
                Progress::Advance
            } else {
                Progress::Stay
            }
        }
        Action::Finish => Progress::Done,
    };

    match progress {
        Progress::Stay => {}
        Progress::Done => bridge.complete(Ok(())),
        Progress::Advance => {
            let next = match bridge.with_transfer(|t| t.direction()) {
                Direction::Read => transition.next_read,
                Direction::Write => transition.next_write,
            };
            bridge.set_state(next);
        }
    }
}

/// Error interrupt: NACK retry policy and fatal bus conditions.
pub fn handle_error_interrupt<const N: usize, B: InterruptBridge<N>>(bridge: &B) {
    let regs = bridge.peripheral();
    let status = regs.status();
    let errors = status.intersection(Status::ERRORS);

    if errors.is_empty() {
        return;
    }
    regs.clear_errors(errors);

    let state = bridge.get_state();
    if state.is_idle() {
        debug!("error flags {=u32:#x} with no transfer armed", errors.bits());
        return;
    }

    // A NACK is only retryable when nothing else went wrong on the bus.
    let faults = errors.difference(Status::ACK_FAILURE);
    if faults.is_empty() {
        let Some(rewind) = state.nack_rewind() else {
            warn!("nack in {}", state);
            return bridge.complete(Err(Error::Nack));
        };

        let limit = bridge.nack_retry_limit();
        if bridge.with_transfer(|t| t.note_nack(limit)) {
            trace!("slave busy in {}, retrying", state);
            bridge.set_state(rewind);
            return bridge.pause();
        }

        warn!("slave still busy after {} retries", limit);
        return bridge.complete(Err(Error::Nack));
    }

    let error = if faults.contains(Status::BUS_ERROR) {
        Error::Bus
    } else if faults.contains(Status::OVERRUN) {
        Error::Overrun
    } else if faults.contains(Status::ARBITRATION_LOST) {
        Error::ArbitrationLoss
    } else {
        Error::Bus
    };

    error!("i2c error {} in {}, flags {=u32:#x}", error, state, errors.bits());
    bridge.complete(Err(error));
}
