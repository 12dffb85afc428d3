//! guardpost — ESP-IDF std firmware
//!
//! Thread-based implementation using FreeRTOS threads and std::sync::mpsc
//! channels. The main thread polls the sensors, a bus thread serves the
//! companion module as an I2C slave, the siren thread drives the piezo and
//! a status thread prints NDJSON status lines to the console.

mod io;
mod siren;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_svc::hal::delay::{TickType, NON_BLOCK};
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::i2c::{I2cSlaveConfig, I2cSlaveDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::sys::ESP_ERR_TIMEOUT;
use heapless::Vec;

use guardpost::alarm::{handle_trigger, AlarmResponse, TriggerEvent};
use guardpost::comm::{self, BusWatchdog, LineReader, PendingAction};
use guardpost::defaults::{self, MAX_SENSORS};
use guardpost::flags::{Flag, GuardEdge};
use guardpost::protocol::{DeviceMessage, FLAGS_OFFSET, FRAME_LEN, VERSION};
use guardpost::registry::SensorRegistry;
use guardpost::shared::SharedController;
use guardpost::{board, queue};

use io::PinIo;
use siren::SirenCommand;

// ── Shared state ─────────────────────────────────────────────────────

static CONTROLLER: SharedController = SharedController::new(defaults::BOOT_FLAGS);
static WATCHDOG: Mutex<BusWatchdog> = Mutex::new(BusWatchdog::new(defaults::BUS_WATCHDOG_MS, 0));
static SENSOR_COUNT: AtomicU8 = AtomicU8::new(0);
static COMPANION_ONLINE: AtomicBool = AtomicBool::new(false);

/// Boot time — captured once in main, used for uptime calculation.
static BOOT_INSTANT: Mutex<Option<Instant>> = Mutex::new(None);

pub(crate) fn uptime_secs() -> u32 {
    BOOT_INSTANT
        .lock()
        .ok()
        .and_then(|i| i.map(|boot| boot.elapsed().as_secs() as u32))
        .unwrap_or(0)
}

fn uptime_millis_u32() -> u32 {
    BOOT_INSTANT
        .lock()
        .ok()
        .and_then(|i| i.map(|boot| (boot.elapsed().as_millis() & 0xFFFF_FFFF) as u32))
        .unwrap_or(0)
}

/// Bus thread receive timeout; also bounds how long a frame waits to be queued
const BUS_POLL_MS: u64 = 10;

/// Frames the slave driver accepts before the master has read any
/// (hardware FIFO plus TX ring)
const PRELOADED_FRAMES: u32 = 2;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();

    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    // Record boot time
    *BOOT_INSTANT.lock().unwrap() = Some(Instant::now());

    log::info!("guardpost v{} starting on {} (std)", VERSION, board::BOARD_NAME);

    let mut registry = SensorRegistry::from_config(defaults::SENSORS);
    SENSOR_COUNT.store(registry.len() as u8, Ordering::Relaxed);
    log::info!("Sensor table loaded: {} sensors", registry.len());

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;

    // Typed pins must match the board constants the library reports
    #[cfg(feature = "devkitc")]
    const _: () = assert!(
        board::BUS_SDA_PIN == 21
            && board::BUS_SCL_PIN == 22
            && board::COMPANION_RESET_PIN == 25
            && board::SIREN_PIN == 26
    );
    #[cfg(feature = "xiao")]
    const _: () = assert!(
        board::BUS_SDA_PIN == 5
            && board::BUS_SCL_PIN == 6
            && board::COMPANION_RESET_PIN == 4
            && board::SIREN_PIN == 3
    );

    #[cfg(feature = "devkitc")]
    let (sda, scl, reset_pin, siren_pin) = (
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        peripherals.pins.gpio25,
        peripherals.pins.gpio26,
    );
    #[cfg(feature = "xiao")]
    let (sda, scl, reset_pin, siren_pin) = (
        peripherals.pins.gpio5,
        peripherals.pins.gpio6,
        peripherals.pins.gpio4,
        peripherals.pins.gpio3,
    );

    // Companion reset line idles high
    let mut companion_reset = PinDriver::output(reset_pin)?;
    companion_reset.set_high()?;
    log::info!("Companion reset on GPIO{}", board::COMPANION_RESET_PIN);

    // ── Siren thread ─────────────────────────────────────────────────

    let (siren_tx, siren_rx) = mpsc::sync_channel::<SirenCommand>(4);
    {
        let ledc_timer = peripherals.ledc.timer0;
        let ledc_channel = peripherals.ledc.channel0;
        thread::Builder::new()
            .name("siren".into())
            .stack_size(2048)
            .spawn(move || {
                siren::siren_thread(siren_rx, ledc_timer, ledc_channel, siren_pin);
            })?;
        log::info!("Siren thread spawned");
    }

    // ── Bus thread ───────────────────────────────────────────────────

    let bus_config = I2cSlaveConfig::new()
        .rx_buffer_length(queue::INBOUND_CAPACITY * 2)
        .tx_buffer_length(FRAME_LEN);
    let bus = I2cSlaveDriver::new(peripherals.i2c0, sda, scl, board::BUS_ADDRESS, &bus_config)?;
    thread::Builder::new()
        .name("bus".into())
        .stack_size(4096)
        .spawn(move || {
            bus_thread(bus);
        })?;
    log::info!(
        "Bus thread spawned, slave address 0x{:02x} (SDA GPIO{}, SCL GPIO{})",
        board::BUS_ADDRESS,
        board::BUS_SDA_PIN,
        board::BUS_SCL_PIN
    );

    // ── Status thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("status".into())
        .stack_size(4096)
        .spawn(status_thread)?;
    log::info!("Status thread spawned");

    // ── Sensor polling loop (main thread) ────────────────────────────

    let mut io = PinIo::new(&registry)?;
    let mut lines = LineReader::new();
    let tick = Duration::from_millis(defaults::TICK_MS);
    let mut next_tick = Instant::now() + tick;

    loop {
        let mut events = Vec::<TriggerEvent, MAX_SENSORS>::new();
        registry.poll(&mut io, &mut events);

        while Instant::now() >= next_tick {
            registry.tick();
            next_tick += tick;
        }

        let mut responses = Vec::<AlarmResponse, MAX_SENSORS>::new();
        let mut actions = Vec::<PendingAction, 4>::new();
        let mut text = Vec::<u8, { queue::INBOUND_CAPACITY }>::new();
        CONTROLLER.with(|ctl| {
            ctl.publish(&registry);
            for event in &events {
                let _ = responses.push(handle_trigger(ctl, event));
            }
            while let Some(action) = ctl.take_action() {
                let _ = actions.push(action);
            }
            while let Some(byte) = ctl.inbound().pop() {
                let _ = text.push(byte);
            }
        });

        for event in &events {
            emit(&DeviceMessage::Trigger {
                sensor: event.sensor,
                action: event.action.as_str(),
                count: event.count,
                value: event.value,
                ts: uptime_millis_u32(),
            });
        }

        for response in &responses {
            match response {
                AlarmResponse::Siren => {
                    let _ = siren_tx.try_send(SirenCommand::Alarm);
                }
                AlarmResponse::GuardChanged(edge) => log::info!("Guard {:?} by remote", edge),
                AlarmResponse::Notified | AlarmResponse::Ignored => {}
            }
        }

        for action in actions {
            handle_action(action, &mut registry, &siren_tx);
        }

        for &byte in &text {
            if let Some(line) = lines.feed(byte) {
                if let Ok(s) = core::str::from_utf8(line) {
                    log::info!("companion: {}", s);
                }
            }
        }

        let companion_lost = {
            let mut watchdog = WATCHDOG.lock().unwrap();
            let lost = watchdog.poll(uptime_millis_u32());
            COMPANION_ONLINE.store(watchdog.is_online(), Ordering::Relaxed);
            lost
        };
        if companion_lost {
            log::warn!("Companion silent for {} ms, resetting it", defaults::BUS_WATCHDOG_MS);
            companion_reset.set_low()?;
            thread::sleep(Duration::from_millis(defaults::COMPANION_RESET_PULSE_MS));
            companion_reset.set_high()?;
        }

        thread::sleep(Duration::from_millis(defaults::POLL_INTERVAL_MS));
    }
}

// ── Pending actions ──────────────────────────────────────────────────

fn handle_action(action: PendingAction, registry: &mut SensorRegistry, siren_tx: &SyncSender<SirenCommand>) {
    match action {
        PendingAction::Arm => {
            registry.reset_counts();
            CONTROLLER.with(|ctl| ctl.set_flag(Flag::Alarm, false));
            let _ = siren_tx.try_send(SirenCommand::Chirp);
            log::info!("Guard {:?}", GuardEdge::Armed);
        }
        PendingAction::Disarm => {
            CONTROLLER.with(|ctl| ctl.set_flag(Flag::Alarm, false));
            let _ = siren_tx.try_send(SirenCommand::Silence);
            let _ = siren_tx.try_send(SirenCommand::Chirp);
            log::info!("Guard {:?}", GuardEdge::Disarmed);
        }
        PendingAction::ListSensorNames => {
            CONTROLLER.with(|ctl| ctl.queue_sensor_names(registry));
        }
    }
}

// ── Bus thread ───────────────────────────────────────────────────────

/// Serves the companion module.
///
/// Received bytes go to the controller's receive handler. An ESP-IDF slave
/// cannot build its reply when the master asks, so frames are preloaded: the
/// driver holds one in the hardware FIFO and one in the `FRAME_LEN` TX ring.
/// The next frame is only built once the ring took the previous one, and
/// its flags byte is refreshed on every write attempt. Once the pipeline is
/// full, each accepted frame means the master read one, which feeds the
/// watchdog.
fn bus_thread(mut bus: I2cSlaveDriver<'static>) {
    log::info!("Bus thread started");

    let mut rx = [0u8; queue::INBOUND_CAPACITY];
    let mut pending: Option<[u8; FRAME_LEN]> = None;
    let mut preloaded = 0;
    let timeout = TickType::new_millis(BUS_POLL_MS).ticks();

    loop {
        match bus.read(&mut rx, timeout) {
            Ok(n) if n > 0 => CONTROLLER.on_receive(&rx[..n]),
            Ok(_) => {}
            Err(e) if e.code() == ESP_ERR_TIMEOUT as i32 => {}
            Err(e) => log::warn!("Bus read failed: {:?}", e),
        }

        let frame = pending.get_or_insert_with(|| CONTROLLER.on_request());
        frame[FLAGS_OFFSET] = CONTROLLER.with(|ctl| ctl.flags().bits());
        match bus.write(&frame[..], NON_BLOCK) {
            Ok(n) if n == FRAME_LEN => {
                pending = None;
                if preloaded < PRELOADED_FRAMES {
                    preloaded += 1;
                } else if let Ok(mut watchdog) = WATCHDOG.lock() {
                    watchdog.feed(uptime_millis_u32());
                }
            }
            Ok(n) => log::warn!("Bus accepted a partial frame ({} bytes)", n),
            Err(e) if e.code() == ESP_ERR_TIMEOUT as i32 => {}
            Err(e) => log::warn!("Bus write failed: {:?}", e),
        }
    }
}

// ── Status thread ────────────────────────────────────────────────────

fn status_thread() {
    loop {
        thread::sleep(Duration::from_secs(defaults::STATUS_INTERVAL_SECS));

        let flags = CONTROLLER.with(|ctl| ctl.flags());
        emit(&DeviceMessage::Status {
            armed: flags.is_armed(),
            alarm: flags.is_set(Flag::Alarm),
            flags: flags.bits(),
            sensors: SENSOR_COUNT.load(Ordering::Relaxed),
            companion: COMPANION_ONLINE.load(Ordering::Relaxed),
            uptime: uptime_secs(),
            board: board::BOARD_NAME,
            version: VERSION,
        });
    }
}

/// Print one NDJSON line on the console.
fn emit(msg: &DeviceMessage) {
    if let Some(buf) = comm::encode_message(msg) {
        if let Ok(s) = std::str::from_utf8(&buf) {
            log::info!("{}", s.trim_end());
        }
    }
}
