use embedded_hal_async::delay::DelayNs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    Scl,
    Sda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Alternate function, open drain: the I2C peripheral owns the line.
    Peripheral,
    /// High-impedance input.
    Input,
    /// Push-pull output at the level last set with [`BusPins::set_level`].
    Output,
}

/// SCL/SDA pin control of one bus, supplied by the board.
pub trait BusPins {
    fn set_mode(&self, line: Line, mode: PinMode);

    /// Output latch level; takes effect while the line is in [`PinMode::Output`].
    fn set_level(&self, line: Line, high: bool);

    fn is_high(&self, line: Line) -> bool;
}

pub(crate) fn connect<G: BusPins>(pins: &G) {
    pins.set_mode(Line::Scl, PinMode::Peripheral);
    pins.set_mode(Line::Sda, PinMode::Peripheral);
}

pub(crate) fn float<G: BusPins>(pins: &G) {
    pins.set_mode(Line::Scl, PinMode::Input);
    pins.set_mode(Line::Sda, PinMode::Input);
}

/// Pulls both lines low so the pull-ups bleed off whatever charge is left on an unpowered
/// bus.
pub(crate) fn drain<G: BusPins>(pins: &G) {
    for line in [Line::Scl, Line::Sda] {
        pins.set_level(line, false);
        pins.set_mode(line, PinMode::Output);
    }
}

/// Clocks SCL by hand until a slave stuck mid-byte lets go of SDA, then issues a STOP.
///
/// Returns whether SDA is high afterwards. The lines are left floating.
pub(crate) async fn recover<G: BusPins, D: DelayNs>(
    pins: &G,
    delay: &mut D,
    half_period_us: u32,
    max_pulses: u8,
) -> bool {
    pins.set_mode(Line::Sda, PinMode::Input);
    pins.set_level(Line::Scl, true);
    pins.set_mode(Line::Scl, PinMode::Output);
    delay.delay_us(half_period_us).await;

    let mut pulses = 0;
    while !pins.is_high(Line::Sda) && pulses < max_pulses {
        pins.set_level(Line::Scl, false);
        delay.delay_us(half_period_us).await;
        pins.set_level(Line::Scl, true);
        delay.delay_us(half_period_us).await;
        pulses += 1;
    }

    let released = pins.is_high(Line::Sda);
    if released {
        // SDA rising while SCL is high.
        pins.set_level(Line::Sda, false);
        pins.set_mode(Line::Sda, PinMode::Output);
        delay.delay_us(half_period_us).await;
        pins.set_level(Line::Sda, true);
        delay.delay_us(half_period_us).await;
    } else {
        warn!("sda still low after {} clock pulses", pulses);
    }

    float(pins);
    released
}
