#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal_async::delay::DelayNs;
use watch_i2c_bus::{
    handle_error_interrupt, handle_event_interrupt, Bus, BusConfig, BusPins, I2cPeripheral,
    Interrupts, Line, NoRail, PinMode, PowerRail, RailControl, Status, Timing,
};

pub const PMIC: u8 = 0x32;
pub const ACCEL: u8 = 0x19;
pub const HRM: u8 = 0x44;
pub const LED: u8 = 0x30;

pub type TestBus = Bus<CriticalSectionRawMutex, Sim, Sim, Sim, StdDelay>;
pub type RaillessBus = Bus<CriticalSectionRawMutex, Sim, NoRail, Sim, StdDelay>;

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Wall-clock delay that yields instead of sleeping, so `select` keeps polling its other
/// branch.
pub struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let deadline = Instant::now() + Duration::from_nanos(ns as u64);
        while Instant::now() < deadline {
            embassy_futures::yield_now().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Simulated bus
// ---------------------------------------------------------------------------

/// What went over the wires, from the master's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Start,
    RepeatedStart,
    Address { byte: u8, acked: bool },
    /// Byte sent by the master.
    Write(u8),
    /// Byte sent by the slave, and whether the master acknowledged it.
    Read { byte: u8, acked: bool },
    Stop,
}

/// Everything done to the rail, the pins and the peripheral outside of transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hw {
    RailConfigure,
    RailOn,
    RailOff,
    Mode(Line, PinMode),
    Level(Line, bool),
    ClockOn,
    ClockOff,
    Configure(u32),
    Enable,
    Disable,
    SoftReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Event,
    Error,
}

pub struct Slave {
    pub address: u8,
    pub registers: [u8; 256],
    pointer: u8,
    /// Address NACKs still to hand out in the write direction.
    pub nack_writes: usize,
    /// Address NACKs still to hand out in the read direction.
    pub nack_reads: usize,
    /// NACK the first data byte after the register address.
    pub nack_data: bool,
}

impl Slave {
    fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer: 0,
            nack_writes: 0,
            nack_reads: 0,
            nack_data: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Addressing,
    Writing { slave: usize, first: bool },
    Reading { slave: usize, done: bool },
    /// Address or data NACKed; waiting for STOP.
    Held,
}

pub struct SimState {
    pub wire: Vec<Wire>,
    pub hw: Vec<Hw>,
    pub slaves: Vec<Slave>,
    status: Status,
    irq: Interrupts,
    ack: bool,
    enabled: bool,
    phase: Phase,
    tx: Option<u8>,
    dr: u8,
    /// Raise a bus error on the next tick of an open frame.
    pub bus_error: bool,
    /// START requests are ignored.
    pub mute: bool,
    /// STOPs that leave BUSY set until the peripheral is reset.
    pub sticky_stops: usize,
    /// BUSY reads back set no matter what.
    pub busy_forever: bool,
    /// SCL pulses needed before a stuck slave releases SDA.
    pub sda_stuck_pulses: usize,
}

impl SimState {
    fn slave_mut(&mut self, address: u8) -> &mut Slave {
        self.slaves
            .iter_mut()
            .find(|s| s.address == address)
            .expect("no such slave")
    }

    fn tick(&mut self) {
        if !self.enabled {
            return;
        }
        if self.bus_error && self.phase != Phase::Idle {
            self.bus_error = false;
            self.status.insert(Status::BUS_ERROR);
            return;
        }

        match self.phase {
            Phase::Writing { slave, first } => {
                let Some(byte) = self.tx.take() else {
                    return;
                };
                self.wire.push(Wire::Write(byte));
                let target = &mut self.slaves[slave];
                if first {
                    target.pointer = byte;
                    self.phase = Phase::Writing {
                        slave,
                        first: false,
                    };
                } else if target.nack_data {
                    target.nack_data = false;
                    self.status.insert(Status::ACK_FAILURE);
                    self.phase = Phase::Held;
                    return;
                } else {
                    target.registers[target.pointer as usize] = byte;
                    target.pointer = target.pointer.wrapping_add(1);
                }
                self.status.insert(Status::TXE | Status::BTF);
            }
            Phase::Reading { slave, done: false } => {
                if self.status.intersects(Status::ADDR | Status::RXNE) {
                    return;
                }
                let target = &mut self.slaves[slave];
                let byte = target.registers[target.pointer as usize];
                target.pointer = target.pointer.wrapping_add(1);
                self.dr = byte;
                self.status.insert(Status::RXNE);
                self.wire.push(Wire::Read {
                    byte,
                    acked: self.ack,
                });
                if !self.ack {
                    self.phase = Phase::Reading { slave, done: true };
                }
            }
            _ => {}
        }
    }

    fn pending_irq(&self) -> Option<Irq> {
        let status = self.status;
        if self.irq.contains(Interrupts::ERROR) && status.intersects(Status::ERRORS) {
            return Some(Irq::Error);
        }
        if self.irq.contains(Interrupts::EVENT) {
            if status.intersects(Status::START | Status::ADDR | Status::BTF | Status::STOPF) {
                return Some(Irq::Event);
            }
            if self.irq.contains(Interrupts::BUFFER)
                && status.intersects(Status::TXE | Status::RXNE)
            {
                return Some(Irq::Event);
            }
        }
        None
    }

    fn address(&mut self, byte: u8) {
        self.status.remove(Status::START);
        let address = byte >> 1;
        let read = byte & 1 == 1;

        let slave = self.slaves.iter().position(|s| s.address == address);
        let acked = match slave {
            Some(index) => {
                let target = &mut self.slaves[index];
                let nacks = if read {
                    &mut target.nack_reads
                } else {
                    &mut target.nack_writes
                };
                if *nacks > 0 {
                    *nacks -= 1;
                    false
                } else {
                    true
                }
            }
            None => false,
        };
        self.wire.push(Wire::Address { byte, acked });

        match (slave, acked) {
            (Some(slave), true) if read => {
                self.status.insert(Status::ADDR);
                self.status.remove(Status::TRA);
                self.phase = Phase::Reading { slave, done: false };
            }
            (Some(slave), true) => {
                self.status.insert(Status::ADDR | Status::TXE | Status::TRA);
                self.phase = Phase::Writing { slave, first: true };
            }
            _ => {
                self.status.insert(Status::ACK_FAILURE);
                self.phase = Phase::Held;
            }
        }
    }

    fn clear(&mut self) {
        self.status = Status::empty();
        self.irq = Interrupts::empty();
        self.phase = Phase::Idle;
        self.tx = None;
        self.sticky_stops = 0;
    }
}

/// Shared simulation of one bus: peripheral, rail, pins and the slaves on it.
#[derive(Clone)]
pub struct Sim(Arc<Mutex<SimState>>);

impl Sim {
    pub fn new(addresses: &[u8]) -> Self {
        Self(Arc::new(Mutex::new(SimState {
            wire: Vec::new(),
            hw: Vec::new(),
            slaves: addresses.iter().copied().map(Slave::new).collect(),
            status: Status::empty(),
            irq: Interrupts::empty(),
            ack: true,
            enabled: false,
            phase: Phase::Idle,
            tx: None,
            dr: 0,
            bus_error: false,
            mute: false,
            sticky_stops: 0,
            busy_forever: false,
            sda_stuck_pulses: 0,
        })))
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap()
    }

    pub fn slave(&self, address: u8, f: impl FnOnce(&mut Slave)) {
        f(self.state().slave_mut(address))
    }

    pub fn register(&self, address: u8, register: u8) -> u8 {
        self.state().slave_mut(address).registers[register as usize]
    }

    pub fn set_registers(&self, address: u8, first: u8, values: &[u8]) {
        let mut state = self.state();
        let slave = state.slave_mut(address);
        for (i, value) in values.iter().enumerate() {
            slave.registers[first as usize + i] = *value;
        }
    }

    /// Latches BUSY as if another master or a glitch left the bus claimed.
    pub fn force_busy(&self) {
        self.state().status.insert(Status::BUSY);
    }

    pub fn take_wire(&self) -> Vec<Wire> {
        std::mem::take(&mut self.state().wire)
    }

    pub fn take_hw(&self) -> Vec<Hw> {
        std::mem::take(&mut self.state().hw)
    }

    /// Rail switching only.
    pub fn rail_events(&self) -> Vec<Hw> {
        self.state()
            .hw
            .iter()
            .copied()
            .filter(|e| matches!(e, Hw::RailOn | Hw::RailOff))
            .collect()
    }

    pub fn interrupts_enabled(&self) -> Interrupts {
        self.state().irq
    }

    pub fn tick(&self) {
        self.state().tick()
    }

    pub fn pending_irq(&self) -> Option<Irq> {
        self.state().pending_irq()
    }
}

impl I2cPeripheral for Sim {
    fn status(&self) -> Status {
        let mut state = self.state();
        let mut status = state.status;
        if state.busy_forever {
            status.insert(Status::BUSY);
        }
        // Reading SR1 then SR2 clears ADDR.
        state.status.remove(Status::ADDR);
        status
    }

    fn clear_errors(&self, flags: Status) {
        self.state().status.remove(flags.intersection(Status::ERRORS));
    }

    fn read_data(&self) -> u8 {
        let mut state = self.state();
        state.status.remove(Status::RXNE);
        state.dr
    }

    fn write_data(&self, byte: u8) {
        let mut state = self.state();
        match state.phase {
            Phase::Addressing => state.address(byte),
            Phase::Writing { .. } => {
                state.tx = Some(byte);
                state.status.remove(Status::TXE | Status::BTF);
            }
            _ => {}
        }
    }

    fn generate_start(&self) {
        let mut state = self.state();
        if !state.enabled || state.mute {
            return;
        }
        let event = if state.phase == Phase::Idle {
            Wire::Start
        } else {
            Wire::RepeatedStart
        };
        state.wire.push(event);
        state.status.remove(
            Status::BTF | Status::TXE | Status::TRA | Status::ADDR | Status::RXNE,
        );
        state
            .status
            .insert(Status::START | Status::MSL | Status::BUSY);
        state.phase = Phase::Addressing;
        state.tx = None;
    }

    fn generate_stop(&self) {
        let mut state = self.state();
        if !state.enabled || state.phase == Phase::Idle {
            return;
        }
        state.wire.push(Wire::Stop);
        state.status.remove(
            Status::START
                | Status::ADDR
                | Status::BTF
                | Status::TXE
                | Status::TRA
                | Status::RXNE
                | Status::MSL,
        );
        if state.sticky_stops > 0 {
            state.sticky_stops -= 1;
        } else {
            state.status.remove(Status::BUSY);
        }
        state.phase = Phase::Idle;
        state.tx = None;
    }

    fn set_ack(&self, ack: bool) {
        self.state().ack = ack;
    }

    fn enable_interrupts(&self, mask: Interrupts) {
        self.state().irq.insert(mask);
    }

    fn disable_interrupts(&self, mask: Interrupts) {
        self.state().irq.remove(mask);
    }

    fn configure(&self, timing: &Timing) {
        self.state().hw.push(Hw::Configure(timing.speed_hz));
    }

    fn enable(&self) {
        let mut state = self.state();
        state.enabled = true;
        state.hw.push(Hw::Enable);
    }

    fn disable(&self) {
        let mut state = self.state();
        state.enabled = false;
        state.clear();
        state.hw.push(Hw::Disable);
    }

    fn soft_reset(&self) {
        let mut state = self.state();
        state.clear();
        state.hw.push(Hw::SoftReset);
    }

    fn enable_clock(&self) {
        self.state().hw.push(Hw::ClockOn);
    }

    fn disable_clock(&self) {
        self.state().hw.push(Hw::ClockOff);
    }
}

impl RailControl for Sim {
    fn configure(&self) {
        self.state().hw.push(Hw::RailConfigure);
    }

    fn set_enabled(&self, enabled: bool) {
        let event = if enabled { Hw::RailOn } else { Hw::RailOff };
        self.state().hw.push(event);
    }
}

impl BusPins for Sim {
    fn set_mode(&self, line: Line, mode: PinMode) {
        self.state().hw.push(Hw::Mode(line, mode));
    }

    fn set_level(&self, line: Line, high: bool) {
        let mut state = self.state();
        if line == Line::Scl && !high && state.sda_stuck_pulses > 0 {
            state.sda_stuck_pulses -= 1;
        }
        state.hw.push(Hw::Level(line, high));
    }

    fn is_high(&self, line: Line) -> bool {
        match line {
            Line::Scl => true,
            Line::Sda => self.state().sda_stuck_pulses == 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Short timings so failure paths finish quickly.
pub fn test_config() -> BusConfig {
    BusConfig::new()
        .with_rail_settle_ms(1)
        .with_transfer_timeout_ms(200)
        .with_nack_retry(1000, 20)
        .with_busy_poll(20, 10)
}

pub fn new_bus(sim: &Sim, config: BusConfig) -> TestBus {
    Bus::new(
        sim.clone(),
        PowerRail::new(sim.clone()),
        sim.clone(),
        StdDelay,
        config,
    )
}

pub fn new_railless_bus(sim: &Sim, config: BusConfig) -> RaillessBus {
    Bus::new(sim.clone(), PowerRail::none(), sim.clone(), StdDelay, config)
}

/// Runs `f` while a second thread plays the part of the bus's interrupt vectors.
pub fn with_isr<R>(bus: &TestBus, sim: &Sim, f: impl FnOnce() -> R) -> R {
    let stop = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::SeqCst) {
                sim.tick();
                match sim.pending_irq() {
                    Some(Irq::Event) => handle_event_interrupt(bus),
                    Some(Irq::Error) => handle_error_interrupt(bus),
                    None => std::thread::yield_now(),
                }
            }
        });
        let out = f();
        stop.store(true, Ordering::SeqCst);
        out
    })
}

pub fn block_on_with_isr<F: Future>(bus: &TestBus, sim: &Sim, fut: F) -> F::Output {
    with_isr(bus, sim, || embassy_futures::block_on(fut))
}

/// A bus with one user, ready for transfers.
pub fn acquired_bus(sim: &Sim) -> TestBus {
    let bus = new_bus(sim, test_config());
    embassy_futures::block_on(bus.acquire());
    sim.take_hw();
    bus
}

/// Splits the wire log into frames, each ending in STOP.
pub fn frames(wire: &[Wire]) -> Vec<Vec<Wire>> {
    wire.split_inclusive(|w| *w == Wire::Stop)
        .map(|f| f.to_vec())
        .collect()
}

pub fn acked(byte: u8) -> Wire {
    Wire::Address { byte, acked: true }
}

pub fn nacked(byte: u8) -> Wire {
    Wire::Address { byte, acked: false }
}
