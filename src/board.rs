/// Hardware abstraction for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags.

#[cfg(feature = "board-devkitc")]
mod hw {
    pub const BUS_SDA_PIN: u8 = 21;
    pub const BUS_SCL_PIN: u8 = 22;
    pub const COMPANION_RESET_PIN: u8 = 25;
    pub const SIREN_PIN: u8 = 26;
    pub const BOARD_NAME: &str = "esp32_devkitc";
}

#[cfg(feature = "board-xiao")]
mod hw {
    pub const BUS_SDA_PIN: u8 = 5;
    pub const BUS_SCL_PIN: u8 = 6;
    pub const COMPANION_RESET_PIN: u8 = 4;
    pub const SIREN_PIN: u8 = 3;
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(not(any(feature = "board-devkitc", feature = "board-xiao")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// 7-bit slave address the companion module polls.
pub const BUS_ADDRESS: u8 = 0x08;

/// Siren tone for a passive piezo.
pub const SIREN_FREQ_HZ: u32 = 2_700;

/// Length of one siren burst.
pub const SIREN_BURST_MS: u64 = 500;

/// Length of the arm/disarm acknowledgement chirp.
pub const SIREN_CHIRP_MS: u64 = 60;
