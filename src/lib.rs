#![cfg_attr(not(test), no_std)]
//! Shared, interrupt-driven I2C master buses for the watch.
//!
//! Several device drivers (PMIC, accelerometer, heart-rate sensor, LED controller) share a
//! handful of physical buses. Each [`Bus`] reference-counts its users, sequences its power
//! rail, and runs register reads and writes as an interrupt-driven state machine: the
//! calling task arms a transfer and waits, while [`handle_event_interrupt`] and
//! [`handle_error_interrupt`] push it forward one hardware event at a time.

#[macro_use]
mod fmt;

mod buffer;
mod bus;
mod config;
mod error;
mod fsm;
mod hal;
mod interrupts;
mod peripheral;
mod pins;
mod rail;
mod registry;
mod status;
#[cfg(feature = "stm32")]
pub mod stm32;
mod tracker;
mod transfer;

pub use buffer::TransferBuffer;
pub use bus::{Bus, DEFAULT_TRANSFER_CAPACITY};
pub use config::{BusConfig, DutyCycle};
pub use error::Error;
pub use fsm::{Action, State, Transition, TRANSITIONS};
pub use hal::I2cDevice;
pub use interrupts::{handle_error_interrupt, handle_event_interrupt, InterruptBridge};
pub use peripheral::{I2cPeripheral, Timing};
pub use pins::{BusPins, Line, PinMode};
pub use rail::{NoRail, PowerRail, RailControl};
pub use registry::{BusRegistry, Device, RegisterBus};
pub use status::{Event, Interrupts, Status};
pub use tracker::STATES_HISTORY_SIZE;
pub use transfer::{Direction, Transfer};

#[cfg(feature = "dump")]
pub use bus::StateDump;
