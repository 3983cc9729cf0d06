//! Master transfer state machine, kept as data.
//!
//! A transfer always starts in [`State::WriteAddressTx`] and walks the table below one
//! hardware event at a time. Reads branch off after the register address into a repeated
//! START; writes go straight to the data phase. [`State::Idle`] is both the initial and the
//! terminal state.

use crate::status::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::NoUninit)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    /// No transfer in flight.
    Idle,
    WriteAddressTx,
    WriteRegAddress,
    RepeatStart,
    WriteAddressRx,
    WaitForData,
    ReadData,
    WriteData,
    EndWrite,
}

/// What the event handler does on the matching event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Put the slave address on the wire with the write bit clear.
    SendAddressTx,
    /// Put the register address on the wire.
    SendRegister,
    /// Issue a repeated START.
    RepeatStart,
    /// Put the slave address on the wire with the read bit set. Pre-arms the NACK when a
    /// single byte is requested.
    SendAddressRx,
    /// Turn on the buffer interrupt for reception.
    ArmReceive,
    /// Store one received byte. Pre-arms the NACK before the last byte.
    ReceiveByte,
    /// Send one byte from the buffer.
    TransmitByte,
    /// The last byte left the shift register.
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: State,
    pub expect: Event,
    pub action: Action,
    /// Next state of a read once the action completed its phase.
    pub next_read: State,
    /// Next state of a write once the action completed its phase.
    pub next_write: State,
}

const fn step(
    state: State,
    expect: Event,
    action: Action,
    next_read: State,
    next_write: State,
) -> Transition {
    Transition {
        state,
        expect,
        action,
        next_read,
        next_write,
    }
}

/// One row per non-idle state, in declaration order of [`State`].
pub const TRANSITIONS: [Transition; 8] = [
    step(
        State::WriteAddressTx,
        Event::MasterModeSelected,
        Action::SendAddressTx,
        State::WriteRegAddress,
        State::WriteRegAddress,
    ),
    step(
        State::WriteRegAddress,
        Event::TransmitterSelected,
        Action::SendRegister,
        State::RepeatStart,
        State::WriteData,
    ),
    step(
        State::RepeatStart,
        Event::ByteTransmitted,
        Action::RepeatStart,
        State::WriteAddressRx,
        State::WriteAddressRx,
    ),
    step(
        State::WriteAddressRx,
        Event::MasterModeSelected,
        Action::SendAddressRx,
        State::WaitForData,
        State::WaitForData,
    ),
    step(
        State::WaitForData,
        Event::ReceiverSelected,
        Action::ArmReceive,
        State::ReadData,
        State::ReadData,
    ),
    step(
        State::ReadData,
        Event::ByteReceived,
        Action::ReceiveByte,
        State::Idle,
        State::Idle,
    ),
    step(
        State::WriteData,
        Event::ByteTransmitting,
        Action::TransmitByte,
        State::EndWrite,
        State::EndWrite,
    ),
    step(
        State::EndWrite,
        Event::ByteTransmitted,
        Action::Finish,
        State::Idle,
        State::Idle,
    ),
];

impl State {
    /// Table row driving this state, `None` when idle.
    pub fn transition(self) -> Option<&'static Transition> {
        match self {
            State::Idle => None,
            state => TRANSITIONS.get(state as usize - 1),
        }
    }

    /// The event the hardware must report before this state may advance.
    pub fn expected_event(self) -> Option<Event> {
        self.transition().map(|t| t.expect)
    }

    /// Where a NACK sends the machine back to when the slave is only busy.
    ///
    /// Only the two address phases may be retried: a NACKed write address is seen in
    /// `WriteRegAddress`, a NACKed read address in `WaitForData`.
    pub const fn nack_rewind(self) -> Option<State> {
        match self {
            State::WriteRegAddress => Some(State::WriteAddressTx),
            State::WaitForData => Some(State::WriteAddressRx),
            _ => None,
        }
    }

    pub const fn is_idle(self) -> bool {
        matches!(self, State::Idle)
    }
}
