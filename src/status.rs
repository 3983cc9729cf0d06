use bitflags::bitflags;

bitflags! {
    /// Combined status word of an I2C v1 peripheral: `SR1 | SR2 << 16`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Start condition generated.
        const START = 1 << 0;
        /// Address sent and acknowledged.
        const ADDR = 1 << 1;
        /// Byte transfer finished.
        const BTF = 1 << 2;
        const ADD10 = 1 << 3;
        /// Stop detected (slave mode only).
        const STOPF = 1 << 4;
        /// Data register not empty.
        const RXNE = 1 << 6;
        /// Data register empty.
        const TXE = 1 << 7;
        /// Misplaced START or STOP.
        const BUS_ERROR = 1 << 8;
        const ARBITRATION_LOST = 1 << 9;
        /// No acknowledge from the slave.
        const ACK_FAILURE = 1 << 10;
        const OVERRUN = 1 << 11;
        const PEC_ERROR = 1 << 12;
        const TIMEOUT = 1 << 14;
        const SMB_ALERT = 1 << 15;

        /// Master mode.
        const MSL = 1 << 16;
        /// Bus busy: SDA or SCL low, or a communication is ongoing.
        const BUSY = 1 << 17;
        /// Transmitter (as opposed to receiver).
        const TRA = 1 << 18;
        const GENCALL = 1 << 20;
    }
}

impl Status {
    /// Every flag that raises the error interrupt.
    pub const ERRORS: Self = Self::BUS_ERROR
        .union(Self::ARBITRATION_LOST)
        .union(Self::ACK_FAILURE)
        .union(Self::OVERRUN)
        .union(Self::PEC_ERROR)
        .union(Self::TIMEOUT)
        .union(Self::SMB_ALERT);

    pub const fn from_registers(sr1: u16, sr2: u16) -> Self {
        Self::from_bits_truncate(sr1 as u32 | (sr2 as u32) << 16)
    }

    /// Returns the first master event the status satisfies, checked from the most to the
    /// least specific.
    pub fn event(self) -> Option<Event> {
        Event::ALL.into_iter().find(|event| event.matches(self))
    }
}

/// Master-mode hardware events.
///
/// Each event is a set of status flags that must all be present for the event to have
/// happened. Extra flags are ignored, so a more specific event also satisfies the less
/// specific ones it contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// EV5: START (or repeated START) sent, master mode entered.
    MasterModeSelected,
    /// EV6: address sent in write direction and acknowledged.
    TransmitterSelected,
    /// EV6: address sent in read direction and acknowledged.
    ReceiverSelected,
    /// EV7: a data byte arrived.
    ByteReceived,
    /// EV8: data register empty, shift register busy.
    ByteTransmitting,
    /// EV8_2: data register and shift register both empty.
    ByteTransmitted,
}

impl Event {
    const ALL: [Event; 6] = [
        Event::TransmitterSelected,
        Event::ByteTransmitted,
        Event::ByteTransmitting,
        Event::ReceiverSelected,
        Event::ByteReceived,
        Event::MasterModeSelected,
    ];

    pub const fn mask(self) -> Status {
        let master = Status::BUSY.union(Status::MSL);
        match self {
            Event::MasterModeSelected => master.union(Status::START),
            Event::TransmitterSelected => master
                .union(Status::ADDR)
                .union(Status::TXE)
                .union(Status::TRA),
            Event::ReceiverSelected => master.union(Status::ADDR),
            Event::ByteReceived => master.union(Status::RXNE),
            Event::ByteTransmitting => master.union(Status::TXE).union(Status::TRA),
            Event::ByteTransmitted => master
                .union(Status::TXE)
                .union(Status::TRA)
                .union(Status::BTF),
        }
    }

    pub fn matches(self, status: Status) -> bool {
        status.contains(self.mask())
    }
}

bitflags! {
    /// Interrupt enables of the peripheral (CR2 ITEVTEN / ITBUFEN / ITERREN).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u8 {
        const EVENT = 1 << 0;
        const BUFFER = 1 << 1;
        const ERROR = 1 << 2;
    }
}
