//! Board constants for the i.MX6ULL "alphaled" wiring and the knobs that override them.

use crate::pin::{ClockGate, PadConfig};

/// Name of the device-number range, the class and the device node.
pub const DEVICE_NAME: &str = "dtsled";
/// Number of minors claimed.
pub const DEVICE_COUNT: u32 = 1;
/// Device tree node describing the LED registers.
pub const NODE_PATH: &str = "/alphaled";

/// GPIO1_IO03 drives the LED.
pub const LED_LINE: u32 = 3;
/// ALT5 selects the GPIO function on SW_MUX_CTL_PAD_GPIO1_IO03.
pub const MUX_MODE_GPIO: u32 = 0x05;

/// Electrical and logical setup of the controlled pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    /// Bit index of the pin inside its port's data and direction registers.
    pub line: u32,
    /// Clock-gate field enabling the port's clock domain.
    pub clock_gate: ClockGate,
    /// Value written to the mux-select register.
    pub mux_mode: u32,
    /// Value written to the pad-configuration register.
    pub pad: PadConfig,
}

impl PinConfig {
    /// Single-bit mask of the pin in the data and direction registers.
    pub fn mask(&self) -> u32 {
        1 << self.line
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            line: LED_LINE,
            clock_gate: ClockGate::CG13,
            mux_mode: MUX_MODE_GPIO,
            pad: PadConfig::PKE | PadConfig::SPEED_MEDIUM | PadConfig::DSE_R0_6,
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedConfig {
    pub name: &'static str,
    pub count: u32,
    pub node_path: &'static str,
    /// `Some(major)` claims the fixed range `(major, 0)`; `None` asks the framework for one.
    pub major: Option<u32>,
    pub pin: PinConfig,
}

impl LedConfig {
    pub fn with_major(mut self, major: u32) -> Self {
        self.major = Some(major);
        self
    }

    pub fn with_node_path(mut self, node_path: &'static str) -> Self {
        self.node_path = node_path;
        self
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        LedConfig {
            name: DEVICE_NAME,
            count: DEVICE_COUNT,
            node_path: NODE_PATH,
            major: None,
            pin: PinConfig::default(),
        }
    }
}
