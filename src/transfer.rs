use crate::buffer::TransferBuffer;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Read,
    Write,
}

/// The one transfer in flight on a bus.
///
/// Written by the task only while the bus interrupts are off (before arming, after
/// completion) and by the ISR only while they are on.
pub struct Transfer<const N: usize> {
    device_address: u8,
    register_address: u8,
    direction: Direction,
    buffer: TransferBuffer<N>,
    nack_count: u16,
    result: Option<Result<(), Error>>,
}

impl<const N: usize> Transfer<N> {
    pub const fn new() -> Self {
        Self {
            device_address: 0,
            register_address: 0,
            direction: Direction::Read,
            buffer: TransferBuffer::new(),
            nack_count: 0,
            result: None,
        }
    }

    pub fn prepare_read(&mut self, address: u8, register: u8, size: usize) -> Result<(), Error> {
        self.buffer.expect(size).map_err(|_| Error::InvalidLength)?;
        self.begin(address, register, Direction::Read);
        Ok(())
    }

    pub fn prepare_write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Error> {
        self.buffer.load(data).map_err(|_| Error::InvalidLength)?;
        self.begin(address, register, Direction::Write);
        Ok(())
    }

    fn begin(&mut self, address: u8, register: u8, direction: Direction) {
        self.device_address = address;
        self.register_address = register;
        self.direction = direction;
        self.nack_count = 0;
        self.result = None;
    }

    /// Address byte for the write direction.
    pub fn write_address(&self) -> u8 {
        self.device_address << 1
    }

    /// Address byte for the read direction.
    pub fn read_address(&self) -> u8 {
        (self.device_address << 1) | 1
    }

    pub fn register_address(&self) -> u8 {
        self.register_address
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn buffer(&self) -> &TransferBuffer<N> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut TransferBuffer<N> {
        &mut self.buffer
    }

    pub fn nack_count(&self) -> u16 {
        self.nack_count
    }

    /// Counts a slave-busy NACK. Returns `false` once `limit` retries were already spent.
    pub fn note_nack(&mut self, limit: u16) -> bool {
        if self.nack_count < limit {
            self.nack_count += 1;
            true
        } else {
            false
        }
    }

    /// Records the outcome. Only the first call wins; later ones return `false`.
    pub fn finish(&mut self, result: Result<(), Error>) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub fn result(&self) -> Option<Result<(), Error>> {
        self.result
    }
}

impl<const N: usize> Default for Transfer<N> {
    fn default() -> Self {
        Self::new()
    }
}
