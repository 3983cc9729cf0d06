use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;

use crate::{
    bus::Bus,
    peripheral::I2cPeripheral,
    pins::BusPins,
    rail::RailControl,
    Error,
};

/// A slave device wired to one of the buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Device {
    /// Index into the registry's bus table.
    pub bus: usize,
    /// 7-bit slave address.
    pub address: u8,
}

impl Device {
    pub const fn new(bus: usize, address: u8) -> Self {
        assert!(address <= 0x7F, "10-bit addresses are not supported");
        Self { bus, address }
    }
}

/// Register-level operations of a shared bus, as used by the registry.
#[allow(async_fn_in_trait)]
pub trait RegisterBus {
    async fn acquire(&self);

    async fn release(&self);

    async fn reset(&self);

    async fn read_register_block(
        &self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Error>;

    async fn write_register_block(
        &self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), Error>;
}

impl<M, P, R, G, D, const N: usize> RegisterBus for Bus<M, P, R, G, D, N>
where
    M: RawMutex,
    P: I2cPeripheral,
    R: RailControl,
    G: BusPins,
    D: DelayNs,
{
    async fn acquire(&self) {
        Bus::acquire(self).await
    }

    async fn release(&self) {
        Bus::release(self).await
    }

    async fn reset(&self) {
        Bus::reset(self).await
    }

    async fn read_register_block(
        &self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        Bus::read_register_block(self, address, register, buf).await
    }

    async fn write_register_block(
        &self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        Bus::write_register_block(self, address, register, data).await
    }
}

/// Board device table: maps device identifiers to a bus and a slave address.
///
/// Identifiers are whatever the board uses (typically a `#[repr(usize)]` enum) as long as
/// they convert to an index into `devices`.
pub struct BusRegistry<'a, B> {
    buses: &'a [B],
    devices: &'a [Device],
}

impl<'a, B: RegisterBus> BusRegistry<'a, B> {
    /// Panics if a device points at a bus that does not exist.
    pub fn new(buses: &'a [B], devices: &'a [Device]) -> Self {
        for device in devices {
            if device.bus >= buses.len() {
                error!("device {=u8:#x} on missing bus {}", device.address, device.bus);
                panic!("device table references a missing bus");
            }
        }
        Self { buses, devices }
    }

    pub fn device<I: Into<usize>>(&self, id: I) -> Device {
        let index = id.into();
        match self.devices.get(index) {
            Some(device) => *device,
            None => {
                error!("no device with id {}", index);
                panic!("device id out of range");
            }
        }
    }

    fn resolve<I: Into<usize>>(&self, id: I) -> (&'a B, u8) {
        let device = self.device(id);
        let buses: &'a [B] = self.buses;
        (&buses[device.bus], device.address)
    }

    pub fn bus<I: Into<usize>>(&self, id: I) -> &'a B {
        self.resolve(id).0
    }

    pub async fn bus_use<I: Into<usize>>(&self, id: I) {
        self.bus(id).acquire().await
    }

    pub async fn bus_release<I: Into<usize>>(&self, id: I) {
        self.bus(id).release().await
    }

    pub async fn bus_reset<I: Into<usize>>(&self, id: I) {
        self.bus(id).reset().await
    }

    pub async fn read_register<I: Into<usize>>(&self, id: I, register: u8) -> Result<u8, Error> {
        let mut value = [0];
        self.read_register_block(id, register, &mut value).await?;
        Ok(value[0])
    }

    pub async fn read_register_block<I: Into<usize>>(
        &self,
        id: I,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        let (bus, address) = self.resolve(id);
        bus.read_register_block(address, register, buf).await
    }

    pub async fn write_register<I: Into<usize>>(
        &self,
        id: I,
        register: u8,
        value: u8,
    ) -> Result<(), Error> {
        self.write_register_block(id, register, &[value]).await
    }

    pub async fn write_register_block<I: Into<usize>>(
        &self,
        id: I,
        register: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        let (bus, address) = self.resolve(id);
        bus.write_register_block(address, register, data).await
    }
}
