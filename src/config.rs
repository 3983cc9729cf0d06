use crate::peripheral::Timing;

/// Fast-mode SCL duty cycle (low/high).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DutyCycle {
    Ratio2To1,
    Ratio16To9,
}

/// Per-bus tunables.
///
/// The retry and polling limits are counts, not wall-clock guarantees: their real duration
/// depends on the delay provider handed to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub speed_hz: u32,
    pub duty_cycle: DutyCycle,
    /// Time the rail needs after switching on before the pins may be reconfigured.
    pub rail_settle_ms: u32,
    /// Upper bound on one START attempt.
    pub transfer_timeout_ms: u32,
    /// Slave-busy NACKs tolerated per transfer.
    pub nack_retry_limit: u16,
    pub nack_retry_delay_us: u32,
    /// Polls of the hardware BUSY flag before giving up.
    pub busy_poll_limit: u32,
    pub busy_poll_interval_us: u32,
    /// SCL pulses issued to free a slave that holds SDA low.
    pub recovery_clock_pulses: u8,
}

impl BusConfig {
    pub const fn new() -> Self {
        Self {
            speed_hz: 400_000,
            duty_cycle: DutyCycle::Ratio2To1,
            rail_settle_ms: 10,
            transfer_timeout_ms: 100,
            nack_retry_limit: 1000,
            nack_retry_delay_us: 1000,
            busy_poll_limit: 1000,
            busy_poll_interval_us: 10,
            recovery_clock_pulses: 9,
        }
    }

    pub const fn with_speed(mut self, speed_hz: u32, duty_cycle: DutyCycle) -> Self {
        self.speed_hz = speed_hz;
        self.duty_cycle = duty_cycle;
        self
    }

    pub const fn with_rail_settle_ms(mut self, ms: u32) -> Self {
        self.rail_settle_ms = ms;
        self
    }

    pub const fn with_transfer_timeout_ms(mut self, ms: u32) -> Self {
        self.transfer_timeout_ms = ms;
        self
    }

    pub const fn with_nack_retry(mut self, limit: u16, delay_us: u32) -> Self {
        self.nack_retry_limit = limit;
        self.nack_retry_delay_us = delay_us;
        self
    }

    pub const fn with_busy_poll(mut self, limit: u32, interval_us: u32) -> Self {
        self.busy_poll_limit = limit;
        self.busy_poll_interval_us = interval_us;
        self
    }

    pub const fn with_recovery_clock_pulses(mut self, pulses: u8) -> Self {
        self.recovery_clock_pulses = pulses;
        self
    }

    pub const fn timing(&self) -> Timing {
        Timing {
            speed_hz: self.speed_hz,
            duty_cycle: self.duty_cycle,
        }
    }

    /// Half an SCL period, used when clocking the bus by hand.
    pub const fn half_period_us(&self) -> u32 {
        let half = 500_000 / self.speed_hz;
        if half == 0 {
            1
        } else {
            half
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}
