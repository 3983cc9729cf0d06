use heapless::Vec;

/// Fixed-capacity byte buffer walked by a cursor.
///
/// For a write the buffer is loaded up-front and drained byte by byte; for a read it starts
/// empty with an expected size and fills up as bytes arrive. The cursor never passes the
/// size.
pub struct TransferBuffer<const N: usize> {
    data: Vec<u8, N>,
    size: usize,
    cursor: usize,
}

impl<const N: usize> TransferBuffer<N> {
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            size: 0,
            cursor: 0,
        }
    }

    /// Loads bytes to transmit. Fails without touching the buffer if they do not fit.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), ()> {
        if bytes.len() > N {
            return Err(());
        }
        self.data.clear();
        self.data.extend_from_slice(bytes)?;
        self.size = bytes.len();
        self.cursor = 0;
        Ok(())
    }

    /// Prepares to receive `size` bytes.
    pub fn expect(&mut self, size: usize) -> Result<(), ()> {
        if size > N {
            return Err(());
        }
        self.data.clear();
        self.size = size;
        self.cursor = 0;
        Ok(())
    }

    /// Stores a received byte at the cursor.
    pub fn push_byte(&mut self, byte: u8) -> Result<(), ()> {
        if self.is_complete() {
            return Err(());
        }
        self.data.push(byte).map_err(|_| ())?;
        self.cursor += 1;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.size - self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.size
    }

    /// Bytes received so far.
    pub fn received(&self) -> &[u8] {
        &self.data[..self.cursor]
    }
}

impl<const N: usize> Default for TransferBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Iterator for TransferBuffer<N> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_complete() {
            None
        } else {
            self.cursor += 1;
            self.data.get(self.cursor - 1).copied()
        }
    }
}
