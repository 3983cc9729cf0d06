//! [`I2cPeripheral`] for STM32 I2C v1 register blocks.

use embassy_stm32::{
    pac::{self, i2c::vals},
    time::Hertz,
};

use crate::{
    config::DutyCycle,
    peripheral::{I2cPeripheral, Timing},
    status::{Interrupts, Status},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Instance {
    I2c1,
    I2c2,
    I2c3,
}

pub struct Stm32I2c {
    regs: pac::i2c::I2c,
    instance: Instance,
    pclk: Hertz,
}

impl Stm32I2c {
    /// `pclk` is the APB1 clock feeding the peripheral.
    pub const fn new(instance: Instance, pclk: Hertz) -> Self {
        let regs = match instance {
            Instance::I2c1 => pac::I2C1,
            Instance::I2c2 => pac::I2C2,
            Instance::I2c3 => pac::I2C3,
        };
        Self {
            regs,
            instance,
            pclk,
        }
    }

    fn set_clock(&self, enabled: bool) {
        pac::RCC.apb1enr().modify(|w| match self.instance {
            Instance::I2c1 => w.set_i2c1en(enabled),
            Instance::I2c2 => w.set_i2c2en(enabled),
            Instance::I2c3 => w.set_i2c3en(enabled),
        });
    }
}

impl I2cPeripheral for Stm32I2c {
    fn status(&self) -> Status {
        let sr1 = self.regs.sr1().read().0;
        let sr2 = self.regs.sr2().read().0;
        Status::from_registers(sr1 as u16, sr2 as u16)
    }

    fn clear_errors(&self, flags: Status) {
        self.regs.sr1().modify(|w| {
            if flags.contains(Status::BUS_ERROR) {
                w.set_berr(false);
            }
            if flags.contains(Status::ARBITRATION_LOST) {
                w.set_arlo(false);
            }
            if flags.contains(Status::ACK_FAILURE) {
                w.set_af(false);
            }
            if flags.contains(Status::OVERRUN) {
                w.set_ovr(false);
            }
            if flags.contains(Status::PEC_ERROR) {
                w.set_pecerr(false);
            }
            if flags.contains(Status::TIMEOUT) {
                w.set_timeout(false);
            }
            if flags.contains(Status::SMB_ALERT) {
                w.set_alert(false);
            }
        });
    }

    fn read_data(&self) -> u8 {
        self.regs.dr().read().dr()
    }

    fn write_data(&self, byte: u8) {
        self.regs.dr().write(|w| w.set_dr(byte));
    }

    fn generate_start(&self) {
        self.regs.cr1().modify(|w| w.set_start(true));
    }

    fn generate_stop(&self) {
        self.regs.cr1().modify(|w| w.set_stop(true));
    }

    fn set_ack(&self, ack: bool) {
        self.regs.cr1().modify(|w| w.set_ack(ack));
    }

    fn enable_interrupts(&self, mask: Interrupts) {
        self.regs.cr2().modify(|w| {
            if mask.contains(Interrupts::EVENT) {
                w.set_itevten(true);
            }
            if mask.contains(Interrupts::BUFFER) {
                w.set_itbufen(true);
            }
            if mask.contains(Interrupts::ERROR) {
                w.set_iterren(true);
            }
        });
    }

    fn disable_interrupts(&self, mask: Interrupts) {
        self.regs.cr2().modify(|w| {
            if mask.contains(Interrupts::EVENT) {
                w.set_itevten(false);
            }
            if mask.contains(Interrupts::BUFFER) {
                w.set_itbufen(false);
            }
            if mask.contains(Interrupts::ERROR) {
                w.set_iterren(false);
            }
        });
    }

    fn configure(&self, timing: &Timing) {
        let pclk = self.pclk.0;
        let freq = (pclk / 1_000_000) as u8;
        let regs = self.regs;

        regs.cr1().modify(|w| w.set_pe(false));
        regs.cr2().modify(|w| w.set_freq(freq));

        if timing.speed_hz <= 100_000 {
            regs.trise().modify(|w| w.set_trise(freq + 1));
            regs.ccr().modify(|w| {
                w.set_ccr((pclk / (timing.speed_hz * 2)) as u16);
                w.set_duty(vals::Duty::DUTY2_1);
                w.set_f_s(vals::FS::STANDARD);
            });
        } else {
            regs.trise()
                .modify(|w| w.set_trise((freq as u16 * 300 / 1000) as u8 + 1));
            regs.ccr().modify(|w| {
                let (duty, divider) = match timing.duty_cycle {
                    DutyCycle::Ratio2To1 => (vals::Duty::DUTY2_1, 3),
                    DutyCycle::Ratio16To9 => (vals::Duty::DUTY16_9, 25),
                };
                w.set_ccr(((pclk / (timing.speed_hz * divider)) as u16).max(1));
                w.set_duty(duty);
                w.set_f_s(vals::FS::FAST);
            });
        }
    }

    fn enable(&self) {
        self.regs.cr1().modify(|w| w.set_pe(true));
    }

    fn disable(&self) {
        self.regs.cr1().modify(|w| w.set_pe(false));
    }

    fn soft_reset(&self) {
        self.regs.cr1().modify(|w| w.set_swrst(true));
        self.regs.cr1().modify(|w| w.set_swrst(false));
    }

    fn enable_clock(&self) {
        self.set_clock(true);
    }

    fn disable_clock(&self) {
        self.set_clock(false);
    }
}
