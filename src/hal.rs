//! `embedded-hal-async` view of a shared bus, for off-the-shelf device drivers.

use embedded_hal::i2c::{ErrorType, Operation, SevenBitAddress};
use embedded_hal_async::i2c::I2c;

use crate::{registry::RegisterBus, Error};

/// Borrowed handle implementing [`I2c`] on top of the register API.
///
/// Only register-shaped transactions are supported: a single write of
/// `[register, data..]`, or a write of `[register]` followed by a read. Anything else fails
/// with [`Error::Unsupported`] without touching the bus.
pub struct I2cDevice<'a, B> {
    bus: &'a B,
}

impl<'a, B> I2cDevice<'a, B> {
    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }
}

impl<B> ErrorType for I2cDevice<'_, B> {
    type Error = Error;
}

impl<B: RegisterBus> I2c<SevenBitAddress> for I2cDevice<'_, B> {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match operations {
            [Operation::Write(bytes)] => match bytes.split_first() {
                Some((register, data)) if !data.is_empty() => {
                    self.bus.write_register_block(address, *register, data).await
                }
                _ => Err(Error::Unsupported),
            },
            [Operation::Write([register]), Operation::Read(buf)] => {
                self.bus.read_register_block(address, *register, buf).await
            }
            _ => Err(Error::Unsupported),
        }
    }
}
