use core::cell::RefCell;

use atomic::{Atomic, Ordering};
use embassy_futures::select::{select, Either};
use embassy_sync::{
    blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex},
    mutex::Mutex,
    signal::Signal,
};
use embedded_hal_async::delay::DelayNs;

use crate::{
    config::BusConfig,
    fsm::State,
    interrupts::InterruptBridge,
    peripheral::I2cPeripheral,
    pins::{self, BusPins, Line},
    rail::{PowerRail, RailControl},
    status::{Interrupts, Status},
    tracker::StateTracker,
    transfer::Transfer,
    Error,
};

/// Default capacity of the per-bus transfer buffer.
pub const DEFAULT_TRANSFER_CAPACITY: usize = 32;

#[cfg(feature = "dump")]
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateDump {
    pub state_history: [State; crate::STATES_HISTORY_SIZE],
    pub current_state: State,
    pub nack_count: u16,
}

/// Why the ISR woke the waiting task.
#[derive(Debug, Clone, Copy)]
enum Wake {
    Done,
    /// Slave-busy NACK: the transfer was rewound and needs a fresh START.
    Retry,
}

struct Lifecycle<D> {
    users: usize,
    delay: D,
}

enum Request<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl Request<'_> {
    fn len(&self) -> usize {
        match self {
            Request::Read(buf) => buf.len(),
            Request::Write(data) => data.len(),
        }
    }
}

struct OnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

/// One physical I2C bus shared by every device wired to it.
///
/// The bus lock serialises lifecycle operations and transfers. While a transfer is in
/// flight the transfer record belongs to the interrupt handlers, which must be hooked up by
/// the board:
///
/// ```ignore
/// #[interrupt]
/// fn I2C1_EV() {
///     watch_i2c_bus::handle_event_interrupt(&BUS1);
/// }
///
/// #[interrupt]
/// fn I2C1_ER() {
///     watch_i2c_bus::handle_error_interrupt(&BUS1);
/// }
/// ```
pub struct Bus<M: RawMutex, P, R, G, D, const N: usize = DEFAULT_TRANSFER_CAPACITY> {
    peripheral: P,
    rail: PowerRail<R>,
    pins: G,
    config: BusConfig,

    lifecycle: Mutex<M, Lifecycle<D>>,

    transfer: critical_section::Mutex<RefCell<Transfer<N>>>,
    state: StateTracker,
    busy: Atomic<bool>,
    wake: Signal<CriticalSectionRawMutex, Wake>,
}

impl<M: RawMutex, P, R, G, D, const N: usize> Bus<M, P, R, G, D, N> {
    pub const fn new(peripheral: P, rail: PowerRail<R>, pins: G, delay: D, config: BusConfig) -> Self {
        Self {
            peripheral,
            rail,
            pins,
            config,
            lifecycle: Mutex::new(Lifecycle { users: 0, delay }),
            transfer: critical_section::Mutex::new(RefCell::new(Transfer::new())),
            state: StateTracker::new(),
            busy: Atomic::new(false),
            wake: Signal::new(),
        }
    }

    /// Whether a transfer is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Slave-busy retries spent by the most recent transfer.
    pub fn nack_count(&self) -> u16 {
        critical_section::with(|cs| self.transfer.borrow_ref(cs).nack_count())
    }

    /// Number of drivers currently holding the bus.
    pub async fn users(&self) -> usize {
        self.lifecycle.lock().await.users
    }

    #[cfg(feature = "dump")]
    pub fn dump_state(&self) -> StateDump {
        StateDump {
            state_history: self.state.trail(),
            current_state: self.state.current(),
            nack_count: self.nack_count(),
        }
    }
}

impl<M: RawMutex, P: I2cPeripheral, R, G, D, const N: usize> Bus<M, P, R, G, D, N> {
    fn hardware_busy(&self) -> bool {
        self.peripheral.status().contains(Status::BUSY)
    }

    /// Ends the transfer once; whoever gets here second does nothing.
    fn finish(&self, result: Result<(), Error>) {
        let first = critical_section::with(|cs| self.transfer.borrow_ref_mut(cs).finish(result));
        if !first {
            return;
        }

        self.peripheral.disable_interrupts(Interrupts::all());
        self.peripheral.generate_stop();
        self.state.enter(State::Idle);
        self.busy.store(false, Ordering::SeqCst);
        self.wake.signal(Wake::Done);
    }
}

impl<M, P, R, G, D, const N: usize> Bus<M, P, R, G, D, N>
where
    M: RawMutex,
    P: I2cPeripheral,
    R: RailControl,
    G: BusPins,
    D: DelayNs,
{
    /// Boot-time setup: configures the rail control and leaves the bus powered down.
    pub async fn init(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.rail.configure();
        self.rail.power_down(&self.pins);
    }

    /// Takes a reference on the bus, powering it up for the first user.
    pub async fn acquire(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.users == 0 {
            self.bring_up(&mut lifecycle, true).await;
        }
        lifecycle.users += 1;
    }

    /// Drops a reference on the bus, powering it down after the last user.
    pub async fn release(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.users == 0 {
            error!("release of a bus with no users");
            return;
        }
        lifecycle.users -= 1;
        if lifecycle.users == 0 {
            self.shut_down(true);
        }
    }

    /// Recovery: cycles the peripheral, and the rail too when the caller is the only user.
    pub async fn reset(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.reset_locked(&mut lifecycle).await;
    }

    async fn bring_up(&self, lifecycle: &mut Lifecycle<D>, power_on: bool) {
        if power_on {
            self.rail
                .power_up(&self.pins, &mut lifecycle.delay, self.config.rail_settle_ms)
                .await;
        }
        pins::connect(&self.pins);
        self.peripheral.enable_clock();
        self.peripheral.configure(&self.config.timing());
        self.peripheral.set_ack(true);
        self.peripheral.enable();
        debug!("bus up at {} Hz", self.config.speed_hz);
    }

    fn shut_down(&self, power_off: bool) {
        self.peripheral.disable();
        self.peripheral.disable_clock();
        if power_off {
            self.rail.power_down(&self.pins);
        }
        debug!("bus down");
    }

    async fn reset_locked(&self, lifecycle: &mut Lifecycle<D>) {
        if lifecycle.users == 0 {
            error!("reset of a bus with no users");
            return;
        }

        lifecycle.users -= 1;
        let power_cycle = lifecycle.users == 0;

        self.peripheral.soft_reset();
        self.shut_down(power_cycle);

        // A power cycle resets the slaves too; otherwise clock out whatever holds SDA.
        if !(power_cycle && self.rail.is_present()) && !self.pins.is_high(Line::Sda) {
            pins::recover(
                &self.pins,
                &mut lifecycle.delay,
                self.config.half_period_us(),
                self.config.recovery_clock_pulses,
            )
            .await;
        }

        self.bring_up(lifecycle, power_cycle).await;
        lifecycle.users += 1;
        info!("bus reset");
    }

    /// Polls the hardware BUSY flag until it clears or the poll budget runs out.
    async fn wait_idle(&self, delay: &mut D) -> bool {
        for _ in 0..self.config.busy_poll_limit {
            if !self.hardware_busy() {
                return true;
            }
            delay.delay_us(self.config.busy_poll_interval_us).await;
        }
        !self.hardware_busy()
    }

    pub async fn read_register(&self, address: u8, register: u8) -> Result<u8, Error> {
        let mut value = [0];
        self.transfer(address, register, Request::Read(&mut value))
            .await?;
        Ok(value[0])
    }

    /// Reads `buf.len()` consecutive registers starting at `register`.
    ///
    /// The bytes pass through the bus's own transfer buffer, so `buf` must hold between 1
    /// and `N` bytes (32 by default); anything else fails with [`Error::InvalidLength`]
    /// before the bus is touched.
    pub async fn read_register_block(
        &self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        self.transfer(address, register, Request::Read(buf)).await
    }

    pub async fn write_register(&self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        self.transfer(address, register, Request::Write(&[value]))
            .await
    }

    /// Writes `data` to consecutive registers starting at `register`.
    ///
    /// `data` is copied into the bus's transfer buffer, so it must hold between 1 and `N`
    /// bytes (32 by default); anything else fails with [`Error::InvalidLength`] before the
    /// bus is touched.
    pub async fn write_register_block(
        &self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        self.transfer(address, register, Request::Write(data)).await
    }

    async fn transfer(&self, address: u8, register: u8, request: Request<'_>) -> Result<(), Error> {
        let len = request.len();
        if len == 0 || len > N {
            return Err(Error::InvalidLength);
        }

        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.users == 0 {
            error!("transfer to {=u8:#x} on a bus with no users", address);
            return Err(Error::Disabled);
        }

        if self.hardware_busy() {
            warn!("bus busy before transfer to {=u8:#x}, resetting", address);
            self.reset_locked(&mut lifecycle).await;
            if !self.wait_idle(&mut lifecycle.delay).await {
                error!("bus still busy after reset");
                return Err(Error::Busy);
            }
        }

        critical_section::with(|cs| {
            let mut transfer = self.transfer.borrow_ref_mut(cs);
            match &request {
                Request::Read(buf) => transfer.prepare_read(address, register, buf.len()),
                Request::Write(data) => transfer.prepare_write(address, register, data),
            }
        })?;

        let result = {
            // Disarms the peripheral if the caller drops us mid-transfer.
            let _armed = OnDrop(|| self.finish(Err(Error::Timeout)));
            self.run(&mut lifecycle.delay).await
        };

        if let (Ok(()), Request::Read(buf)) = (result, request) {
            critical_section::with(|cs| {
                buf.copy_from_slice(self.transfer.borrow_ref(cs).buffer().received())
            });
        }

        if !self.wait_idle(&mut lifecycle.delay).await {
            error!("bus busy after transfer to {=u8:#x}, resetting", address);
            self.reset_locked(&mut lifecycle).await;
            return Err(Error::Timeout);
        }

        result
    }

    /// Issues START and waits for the ISR, re-issuing START after each slave-busy NACK.
    async fn run(&self, delay: &mut D) -> Result<(), Error> {
        self.wake.reset();
        self.state.arm();
        self.peripheral.set_ack(true);

        loop {
            self.busy.store(true, Ordering::SeqCst);
            self.peripheral.generate_start();
            self.peripheral
                .enable_interrupts(Interrupts::EVENT | Interrupts::ERROR);

            let woke = {
                let timeout = delay.delay_ms(self.config.transfer_timeout_ms);
                select(self.wake.wait(), timeout).await
            };
            match woke {
                Either::First(Wake::Done) => break,
                Either::First(Wake::Retry) => {
                    delay.delay_us(self.config.nack_retry_delay_us).await;
                }
                Either::Second(()) => {
                    warn!("transfer timed out in {}", self.state.current());
                    self.finish(Err(Error::Timeout));
                    break;
                }
            }
        }

        critical_section::with(|cs| self.transfer.borrow_ref(cs).result())
            .unwrap_or(Err(Error::Timeout))
    }
}

impl<M: RawMutex, P: I2cPeripheral, R, G, D, const N: usize> InterruptBridge<N>
    for Bus<M, P, R, G, D, N>
{
    type Peripheral = P;

    fn peripheral(&self) -> &P {
        &self.peripheral
    }

    fn get_state(&self) -> State {
        self.state.current()
    }

    fn set_state(&self, state: State) {
        self.state.enter(state)
    }

    fn with_transfer<T>(&self, f: impl FnOnce(&mut Transfer<N>) -> T) -> T {
        critical_section::with(|cs| f(&mut self.transfer.borrow_ref_mut(cs)))
    }

    fn nack_retry_limit(&self) -> u16 {
        self.config.nack_retry_limit
    }

    fn complete(&self, result: Result<(), Error>) {
        self.finish(result)
    }

    fn pause(&self) {
        self.peripheral.disable_interrupts(Interrupts::all());
        self.peripheral.generate_stop();
        self.busy.store(false, Ordering::SeqCst);
        self.wake.signal(Wake::Retry);
    }
}
