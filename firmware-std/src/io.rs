//! Sensor I/O on ESP-IDF.
//!
//! Sensor pins come from the runtime sensor table, not from typed HAL
//! peripherals, so inputs and the ADC are driven through the IDF C API by
//! GPIO number.

use std::ptr;

use esp_idf_svc::sys::{
    adc_atten_t_ADC_ATTEN_DB_12, adc_bitwidth_t_ADC_BITWIDTH_12, adc_channel_t,
    adc_oneshot_chan_cfg_t, adc_oneshot_config_channel, adc_oneshot_io_to_channel,
    adc_oneshot_new_unit, adc_oneshot_read, adc_oneshot_unit_handle_t,
    adc_oneshot_unit_init_cfg_t, adc_unit_t, adc_unit_t_ADC_UNIT_1, esp, gpio_get_level,
    gpio_mode_t_GPIO_MODE_INPUT, gpio_reset_pin, gpio_set_direction, EspError,
};
use heapless::Vec;

use guardpost::defaults::MAX_SENSORS;
use guardpost::registry::SensorRegistry;
use guardpost::sensor::{Probe, Receiver, SensorIo, SensorKind};

const ADC_MAX: i32 = 4095;

// 10k NTC (B = 3950) on the low side of a 10k divider
const NTC_R0: f32 = 10_000.0;
const NTC_T0: f32 = 298.15;
const NTC_BETA: f32 = 3_950.0;
const NTC_SERIES_R: f32 = 10_000.0;

pub struct PinIo {
    adc: adc_oneshot_unit_handle_t,
    channels: Vec<(u8, adc_channel_t), MAX_SENSORS>,
}

impl PinIo {
    /// Configure every pin the registry uses.
    #[allow(unreachable_patterns)]
    pub fn new(registry: &SensorRegistry) -> Result<Self, EspError> {
        let mut adc: adc_oneshot_unit_handle_t = ptr::null_mut();
        let unit_config = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ..Default::default()
        };
        unsafe { esp!(adc_oneshot_new_unit(&unit_config, &mut adc))? };

        let mut io = Self {
            adc,
            channels: Vec::new(),
        };

        for sensor in registry.iter() {
            match sensor.kind() {
                SensorKind::Digital | SensorKind::DebouncedDigital => io.configure_input(sensor.pin())?,
                SensorKind::Analog | SensorKind::Thermistor => io.configure_adc(sensor.pin())?,
                other => log::warn!("{}: no driver for {:?}, sensor stays silent", sensor.name(), other),
            }
        }

        Ok(io)
    }

    fn configure_input(&mut self, pin: u8) -> Result<(), EspError> {
        unsafe {
            esp!(gpio_reset_pin(pin as i32))?;
            esp!(gpio_set_direction(pin as i32, gpio_mode_t_GPIO_MODE_INPUT))?;
        }
        Ok(())
    }

    fn configure_adc(&mut self, pin: u8) -> Result<(), EspError> {
        let mut unit: adc_unit_t = 0;
        let mut channel: adc_channel_t = 0;
        unsafe { esp!(adc_oneshot_io_to_channel(pin as i32, &mut unit, &mut channel))? };

        if unit != adc_unit_t_ADC_UNIT_1 {
            log::warn!("GPIO{} is not on ADC1, sensor stays silent", pin);
            return Ok(());
        }

        let chan_config = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        unsafe { esp!(adc_oneshot_config_channel(self.adc, channel, &chan_config))? };

        if self.channels.push((pin, channel)).is_err() {
            log::warn!("ADC channel table full, GPIO{} ignored", pin);
        }
        Ok(())
    }

    fn read_adc(&mut self, pin: u8) -> Option<i32> {
        let &(_, channel) = self.channels.iter().find(|(p, _)| *p == pin)?;
        let mut raw = 0;
        match unsafe { esp!(adc_oneshot_read(self.adc, channel, &mut raw)) } {
            Ok(()) => Some(raw),
            Err(e) => {
                log::warn!("ADC read on GPIO{} failed: {:?}", pin, e);
                None
            }
        }
    }
}

/// Whole degrees Celsius from a divider reading; `None` for an open or
/// shorted probe.
fn thermistor_celsius(raw: i32) -> Option<i32> {
    if raw <= 0 || raw >= ADC_MAX {
        return None;
    }
    let r = NTC_SERIES_R * raw as f32 / (ADC_MAX - raw) as f32;
    let kelvin = 1.0 / (1.0 / NTC_T0 + (r / NTC_R0).ln() / NTC_BETA);
    Some((kelvin - 273.15).round() as i32)
}

impl SensorIo for PinIo {
    fn read_level(&mut self, pin: u8) -> bool {
        unsafe { gpio_get_level(pin as i32) != 0 }
    }

    fn read_analog(&mut self, pin: u8) -> Option<i32> {
        self.read_adc(pin)
    }

    #[allow(unreachable_patterns)]
    fn read_probe(&mut self, probe: Probe, pin: u8) -> Option<i32> {
        match probe {
            Probe::Thermistor => thermistor_celsius(self.read_adc(pin)?),
            _ => None,
        }
    }

    fn received_code(&mut self, _receiver: Receiver) -> Option<u32> {
        None
    }

    fn clear_code(&mut self, _receiver: Receiver) {}
}
