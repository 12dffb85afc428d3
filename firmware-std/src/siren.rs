//! Siren driver using ESP-IDF LEDC PWM.
//!
//! Drives a passive piezo at the board siren frequency. The polling loop
//! sends [`SirenCommand`]s over an mpsc channel: an alarm sounds repeated
//! bursts until silenced, arm/disarm get a short chirp.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use esp_idf_svc::hal::gpio::OutputPin;
use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::units::Hertz;

use guardpost::board;

/// Bursts per alarm before the siren gives up on its own (about five minutes)
const ALARM_BURSTS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SirenCommand {
    Alarm,
    Chirp,
    Silence,
}

pub fn siren_thread<T, C>(
    siren_rx: mpsc::Receiver<SirenCommand>,
    timer: impl Peripheral<P = T> + 'static,
    channel: impl Peripheral<P = C> + 'static,
    pin: impl Peripheral<P = impl OutputPin> + 'static,
)
where
    T: LedcTimer + 'static,
    C: LedcChannel<SpeedMode = T::SpeedMode> + 'static,
{
    let timer_config = TimerConfig::new()
        .frequency(Hertz(board::SIREN_FREQ_HZ))
        .resolution(Resolution::Bits8);

    let timer_driver = match LedcTimerDriver::new(timer, &timer_config) {
        Ok(t) => t,
        Err(e) => {
            log::error!("LEDC timer init failed: {:?}", e);
            return;
        }
    };

    let mut driver = match LedcDriver::new(channel, &timer_driver, pin) {
        Ok(c) => c,
        Err(e) => {
            log::error!("LEDC channel init failed: {:?}", e);
            return;
        }
    };

    let on = driver.get_max_duty() / 2;
    log::info!("Siren ready on GPIO{}", board::SIREN_PIN);

    while let Ok(cmd) = siren_rx.recv() {
        match cmd {
            SirenCommand::Chirp => {
                driver.set_duty(on).ok();
                std::thread::sleep(Duration::from_millis(board::SIREN_CHIRP_MS));
                driver.set_duty(0).ok();
            }
            SirenCommand::Silence => {
                driver.set_duty(0).ok();
            }
            SirenCommand::Alarm => {
                log::warn!("Siren on");
                for _ in 0..ALARM_BURSTS {
                    driver.set_duty(on).ok();
                    std::thread::sleep(Duration::from_millis(board::SIREN_BURST_MS));
                    driver.set_duty(0).ok();

                    match siren_rx.recv_timeout(Duration::from_millis(board::SIREN_BURST_MS)) {
                        Ok(SirenCommand::Silence) => break,
                        Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                driver.set_duty(0).ok();
                log::info!("Siren off");
            }
        }
    }
}
