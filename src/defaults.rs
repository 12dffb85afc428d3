/// Compiled-in sensor table and timing constants.
///
/// Time units are the controller's tick: one second on the firmware.

use crate::alarm::TriggerAction;
use crate::sensor::{SensorConfig, SensorKind};

/// Delay before a debounced input is read again to confirm a detection.
pub const RECHECK_DELAY: u8 = 10;

/// Analog-family sensors are sampled once per this many ticks.
pub const ANALOG_SAMPLE_INTERVAL: u8 = 10;

/// Sensors held in the registry (and in the bus value snapshot).
pub const MAX_SENSORS: usize = 16;

/// Pause between polling passes in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Length of one tick in milliseconds.
pub const TICK_MS: u64 = 1_000;

/// Reset the companion module if it has not polled us for this long.
pub const BUS_WATCHDOG_MS: u32 = 30_000;

/// How long the companion reset line is held low.
pub const COMPANION_RESET_PULSE_MS: u64 = 1_000;

/// Period of the NDJSON status line on the serial console.
pub const STATUS_INTERVAL_SECS: u64 = 30;

/// Flags at boot: disarmed, SMS reporting on.
pub const BOOT_FLAGS: u8 = 1 << 4;

/// The installation's sensors, in bus index order.
///
/// Pins follow the DevKitC wiring; input-only GPIO34..39 carry the analog
/// and PIR lines.
pub static SENSORS: &[SensorConfig] = &[
    SensorConfig {
        kind: SensorKind::Digital,
        name: "door",
        pin: 27,
        rest_level: false,
        start_delay: 0,
        threshold: 0,
        action: TriggerAction::Intrusion,
    },
    SensorConfig {
        kind: SensorKind::Digital,
        name: "window",
        pin: 14,
        rest_level: false,
        start_delay: 0,
        threshold: 0,
        action: TriggerAction::Intrusion,
    },
    // PIR modules need about a minute to settle after power-up
    SensorConfig {
        kind: SensorKind::DebouncedDigital,
        name: "pir",
        pin: 34,
        rest_level: false,
        start_delay: 60,
        threshold: 0,
        action: TriggerAction::Intrusion,
    },
    SensorConfig {
        kind: SensorKind::Analog,
        name: "smoke",
        pin: 35,
        rest_level: false,
        start_delay: 30,
        threshold: 1_800,
        action: TriggerAction::Notify,
    },
    #[cfg(feature = "thermistor")]
    SensorConfig {
        kind: SensorKind::Thermistor,
        name: "boiler",
        pin: 32,
        rest_level: false,
        start_delay: 0,
        threshold: 85,
        action: TriggerAction::Notify,
    },
    #[cfg(feature = "ir")]
    SensorConfig {
        kind: SensorKind::IrRemote,
        name: "remote",
        pin: 33,
        rest_level: false,
        start_delay: 0,
        threshold: 0x20DF_10EF_u32 as i32,
        action: TriggerAction::ToggleGuard,
    },
];
