//! Register sequencing for the LED pin.
//!
//! Shared registers (clock gates, port data, port direction) are only ever changed with a
//! read-modify-write so that bits belonging to other peripherals or pins survive. Registers
//! dedicated to the pin (mux, pad) are written directly.

use crate::{
    config::PinConfig,
    mapper::{IoMapper, RegionSet},
    mmio::Register,
    resolver::RegionIndex,
};
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Logical LED state, as written by user space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PinState {
    Off = 0,
    On = 1,
}

bitflags! {
    /// Clock-gate fields of CCM_CCGR1.
    pub struct ClockGate: u32 {
        /// CG13: gpio1 clock, on in run and wait modes.
        const CG13 = 0b11 << 26;
    }
}

bitflags! {
    /// Fields of an IOMUXC SW_PAD_CTL register.
    pub struct PadConfig: u32 {
        /// Schmitt trigger input.
        const HYS            = 1 << 16;
        /// 100K pull-up (with PUE).
        const PUS_100K_UP    = 0b10 << 14;
        /// Pull rather than keeper.
        const PUE            = 1 << 13;
        /// Pull/keeper enable.
        const PKE            = 1 << 12;
        /// Open drain.
        const ODE            = 1 << 11;
        /// 100MHz speed.
        const SPEED_MEDIUM   = 0b10 << 6;
        /// Drive strength R0/6.
        const DSE_R0_6       = 0b110 << 3;
        /// Fast slew rate.
        const SRE            = 1 << 0;
    }
}

/// Borrowed view of the five mapped registers plus the pin they drive.
pub struct PinController<'r> {
    clock_gate: &'r Register<u32>,
    mux: &'r Register<u32>,
    pad: &'r Register<u32>,
    data: &'r Register<u32>,
    direction: &'r Register<u32>,
    config: &'r PinConfig,
}

impl<'r> PinController<'r> {
    /// Borrow the registers of `regions`. Returns `None` unless all five are mapped.
    pub fn new<M: IoMapper>(
        regions: &'r RegionSet<M>,
        config: &'r PinConfig,
    ) -> Option<PinController<'r>> {
        Some(PinController {
            clock_gate: regions.register(RegionIndex::ClockGate)?,
            mux: regions.register(RegionIndex::PinMux)?,
            pad: regions.register(RegionIndex::PadConfig)?,
            data: regions.register(RegionIndex::Data)?,
            direction: regions.register(RegionIndex::Direction)?,
            config,
        })
    }

    /// Bring the pin up as a driven-off GPIO output.
    ///
    /// Order matters: clock before mux, mux before pad, pad before direction, direction before
    /// the first drive.
    pub fn configure(&self) {
        let gate = self.config.clock_gate.bits();
        self.clock_gate.modify(|val| val | gate);

        self.mux.write(self.config.mux_mode);

        self.pad.write(self.config.pad.bits());

        let mask = self.config.mask();
        self.direction.modify(|val| val | mask);

        self.drive(PinState::Off);
    }

    /// Set the pin. The LED is wired active-low: a cleared bit lights it.
    pub fn drive(&self, state: PinState) {
        let mask = self.config.mask();
        match state {
            PinState::On => self.data.modify(|val| val & !mask),
            PinState::Off => self.data.modify(|val| val | mask),
        }
    }

    /// Read the pin state back from the data register.
    pub fn state(&self) -> PinState {
        if self.data.read() & self.config.mask() == 0 {
            PinState::On
        } else {
            PinState::Off
        }
    }
}
