use crate::config::DutyCycle;
use crate::status::{Interrupts, Status};

/// Bus timing programmed into the peripheral when the bus is brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    pub speed_hz: u32,
    pub duty_cycle: DutyCycle,
}

/// Register-level access to one I2C master peripheral.
///
/// Methods take `&self` because the same peripheral is driven from the waiting task and from
/// the event/error interrupt handlers.
pub trait I2cPeripheral {
    /// Reads SR1 then SR2. On real hardware this sequence clears `ADDR`.
    fn status(&self) -> Status;

    /// Clears the given error flags (rc_w0 bits of SR1).
    fn clear_errors(&self, flags: Status);

    fn read_data(&self) -> u8;

    fn write_data(&self, byte: u8);

    fn generate_start(&self);

    fn generate_stop(&self);

    /// Whether the next received byte is acknowledged.
    fn set_ack(&self, ack: bool);

    fn enable_interrupts(&self, mask: Interrupts);

    fn disable_interrupts(&self, mask: Interrupts);

    /// Programs clock speed and duty cycle. Leaves the peripheral disabled.
    fn configure(&self, timing: &Timing);

    fn enable(&self);

    fn disable(&self);

    /// Pulses the peripheral's software reset.
    fn soft_reset(&self);

    fn enable_clock(&self);

    fn disable_clock(&self);
}
