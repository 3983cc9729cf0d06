use embedded_hal_async::delay::DelayNs;

use crate::pins::{self, BusPins};

/// Switchable supply of one bus, one implementation per board variant.
pub trait RailControl {
    /// One-time setup of the rail enable pin.
    fn configure(&self);

    fn set_enabled(&self, enabled: bool);
}

/// Stand-in for buses powered from an always-on supply.
pub enum NoRail {}

impl RailControl for NoRail {
    fn configure(&self) {
        match *self {}
    }

    fn set_enabled(&self, _enabled: bool) {
        match *self {}
    }
}

/// Power sequencing of a bus rail. Every operation is a no-op when the bus has no rail.
pub struct PowerRail<R> {
    control: Option<R>,
}

impl<R: RailControl> PowerRail<R> {
    pub const fn new(control: R) -> Self {
        Self {
            control: Some(control),
        }
    }

    pub const fn is_present(&self) -> bool {
        self.control.is_some()
    }

    pub(crate) fn configure(&self) {
        if let Some(rail) = &self.control {
            rail.configure();
        }
    }

    /// Switches the rail on and waits for it to settle. The lines are left as inputs until
    /// the peripheral takes them over.
    pub(crate) async fn power_up<G: BusPins, D: DelayNs>(
        &self,
        pins: &G,
        delay: &mut D,
        settle_ms: u32,
    ) {
        let Some(rail) = &self.control else {
            return;
        };
        rail.set_enabled(true);
        delay.delay_ms(settle_ms).await;
        pins::float(pins);
        debug!("bus rail up");
    }

    /// Switches the rail off and drains both lines.
    pub(crate) fn power_down<G: BusPins>(&self, pins: &G) {
        let Some(rail) = &self.control else {
            return;
        };
        rail.set_enabled(false);
        pins::drain(pins);
        debug!("bus rail down");
    }
}

impl PowerRail<NoRail> {
    pub const fn none() -> Self {
        Self { control: None }
    }
}
