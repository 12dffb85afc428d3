/// Sensor monitoring engine.
///
/// Each [`Sensor`] is evaluated once per polling cycle. Evaluation reads the
/// hardware through the [`SensorIo`] collaborator, updates the reading and the
/// trigger counter, and hands a [`TriggerEvent`] to the sink when the counter
/// rose. Pin-level debounce, exact-code matching and threshold comparison are
/// the three evaluation families.
use core::fmt::{self, Write};

use crate::alarm::{TriggerAction, TriggerEvent, TriggerSink};
use crate::defaults::{ANALOG_SAMPLE_INTERVAL, RECHECK_DELAY};

/// DHT probe variant
#[cfg(feature = "dht")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht21,
    Dht22,
}

/// Sensor variants. Families other than plain digital/analog are compiled in
/// through cargo features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Contact switch: counts on every departure from the rest level
    Digital,
    /// PIR and other noisy inputs: a departure must survive a recheck
    DebouncedDigital,
    /// Raw ADC reading compared against the threshold
    Analog,
    #[cfg(feature = "thermistor")]
    Thermistor,
    #[cfg(feature = "ds18b20")]
    Ds18b20,
    #[cfg(feature = "dht")]
    Dht(DhtModel),
    /// IR receiver matching one code, latching
    #[cfg(feature = "ir")]
    IrCode,
    /// IR remote button: one trigger per press, never latches
    #[cfg(feature = "ir")]
    IrRemote,
    /// RF receiver matching one code, latching
    #[cfg(feature = "rf")]
    RfCode,
}

impl SensorKind {
    /// Kinds whose reading is a temperature in °C
    pub fn is_temperature(self) -> bool {
        match self {
            #[cfg(feature = "thermistor")]
            SensorKind::Thermistor => true,
            #[cfg(feature = "ds18b20")]
            SensorKind::Ds18b20 => true,
            #[cfg(feature = "dht")]
            SensorKind::Dht(_) => true,
            _ => false,
        }
    }

    /// Kinds compared against the threshold by magnitude
    pub fn is_analog(self) -> bool {
        self == SensorKind::Analog || self.is_temperature()
    }
}

/// Probes whose driver returns an already converted reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    #[cfg(feature = "thermistor")]
    Thermistor,
    #[cfg(feature = "ds18b20")]
    Ds18b20,
    #[cfg(feature = "dht")]
    Dht(DhtModel),
}

/// Code receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    #[cfg(feature = "ir")]
    Infrared,
    #[cfg(feature = "rf")]
    Radio,
}

/// Hardware access the monitor needs. Implemented by the firmware on real
/// pins and by test doubles on the host.
pub trait SensorIo {
    /// Current logic level of a digital input
    fn read_level(&mut self, pin: u8) -> bool;

    /// Raw ADC reading, `None` if the conversion failed
    fn read_analog(&mut self, pin: u8) -> Option<i32>;

    /// Converted probe reading, `None` if the probe did not answer
    fn read_probe(&mut self, probe: Probe, pin: u8) -> Option<i32>;

    /// Latest code captured by a receiver, `None` if nothing arrived
    fn received_code(&mut self, receiver: Receiver) -> Option<u32>;

    /// Forget the captured code so it is not matched again
    fn clear_code(&mut self, receiver: Receiver);
}

/// Static description of one sensor, as compiled into the sensor table.
#[derive(Debug, Clone, Copy)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub name: &'static str,
    pub pin: u8,
    /// Idle logic level (ignored by non-pin kinds)
    pub rest_level: bool,
    /// Warm-up time in time units before the first evaluation
    pub start_delay: u8,
    /// Code to match, or trigger threshold for analog kinds
    pub threshold: i32,
    pub action: TriggerAction,
}

#[derive(Debug, Clone)]
pub struct Sensor {
    kind: SensorKind,
    name: &'static str,
    pin: u8,
    rest_level: bool,
    previous_level: bool,
    threshold: i32,
    count: u16,
    pending_recheck: bool,
    settle_timer: u8,
    enabled: bool,
    value: i32,
    action: TriggerAction,
}

impl Sensor {
    pub const fn new(config: &SensorConfig) -> Self {
        Self {
            kind: config.kind,
            name: config.name,
            pin: config.pin,
            rest_level: config.rest_level,
            previous_level: config.rest_level,
            threshold: config.threshold,
            count: 0,
            pending_recheck: false,
            settle_timer: config.start_delay,
            enabled: true,
            value: 0,
            action: config.action,
        }
    }

    /// Run one evaluation cycle and return the trigger count.
    ///
    /// The sink sees at most one event per call, and only when the count
    /// rose during this call.
    pub fn evaluate<IO, S>(&mut self, io: &mut IO, sink: &mut S) -> u16
    where
        IO: SensorIo,
        S: TriggerSink,
    {
        if !self.enabled {
            return self.count;
        }

        let before = self.count;

        match self.kind {
            SensorKind::Digital | SensorKind::DebouncedDigital => self.evaluate_pin(io),
            #[cfg(feature = "ir")]
            SensorKind::IrCode | SensorKind::IrRemote => self.evaluate_code(io, Receiver::Infrared),
            #[cfg(feature = "rf")]
            SensorKind::RfCode => self.evaluate_code(io, Receiver::Radio),
            _ => self.evaluate_reading(io),
        }

        if self.count > before {
            sink.on_trigger(TriggerEvent {
                sensor: self.name,
                action: self.action,
                count: self.count,
                value: self.value,
            });

            #[cfg(feature = "ir")]
            if self.kind == SensorKind::IrRemote {
                self.count = 0;
            }
        }

        self.count
    }

    fn evaluate_pin<IO: SensorIo>(&mut self, io: &mut IO) {
        let level = io.read_level(self.pin);

        if level != self.rest_level {
            if self.previous_level == self.rest_level {
                if self.kind == SensorKind::DebouncedDigital {
                    self.pending_recheck = true;
                    self.settle_timer = RECHECK_DELAY;
                } else {
                    self.bump();
                }
            } else if self.pending_recheck {
                self.pending_recheck = false;
                self.bump();
            }
        } else if self.pending_recheck {
            // back at rest before the recheck: noise
            self.pending_recheck = false;
        }

        self.previous_level = level;
        self.value = level as i32;
    }

    #[cfg(any(feature = "ir", feature = "rf"))]
    fn evaluate_code<IO: SensorIo>(&mut self, io: &mut IO, receiver: Receiver) {
        let Some(code) = io.received_code(receiver) else {
            return;
        };
        self.value = code as i32;
        if code == self.threshold as u32 {
            self.bump();
            io.clear_code(receiver);
        }
    }

    fn evaluate_reading<IO: SensorIo>(&mut self, io: &mut IO) {
        self.settle_timer = ANALOG_SAMPLE_INTERVAL;

        let reading = match self.kind {
            SensorKind::Analog => io.read_analog(self.pin),
            #[cfg(feature = "thermistor")]
            SensorKind::Thermistor => io.read_probe(Probe::Thermistor, self.pin),
            #[cfg(feature = "ds18b20")]
            SensorKind::Ds18b20 => io.read_probe(Probe::Ds18b20, self.pin),
            #[cfg(feature = "dht")]
            SensorKind::Dht(model) => io.read_probe(Probe::Dht(model), self.pin),
            _ => None,
        };

        let Some(value) = reading else {
            log::debug!("{}: no reading, retrying next cycle", self.name);
            return;
        };

        self.value = value;
        if value >= self.threshold {
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Append `name:<reading> ` to a report line.
    pub fn describe<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "{}:", self.name)?;
        if self.kind == SensorKind::Analog {
            write!(out, "{}", self.value)?;
        } else if self.kind.is_temperature() {
            write!(out, "t={}C", self.value)?;
        } else {
            write!(out, "{}({})", self.count, self.previous_level as u8)?;
        }
        out.write_char(' ')
    }

    /// Advance the settle/warm-up countdown by one time unit.
    pub fn tick(&mut self) {
        self.settle_timer = self.settle_timer.saturating_sub(1);
    }

    /// Whether the polling loop should evaluate this sensor now
    pub fn is_ready(&self) -> bool {
        self.enabled && self.settle_timer == 0
    }

    /// Operator reset of the trigger counter
    pub fn reset_count(&mut self) {
        self.count = 0;
        self.pending_recheck = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn is_pending_recheck(&self) -> bool {
        self.pending_recheck
    }

    pub fn settle_timer(&self) -> u8 {
        self.settle_timer
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use heapless::Vec;

    /// Scripted hardware: tests set the fields before each evaluation.
    #[derive(Default)]
    pub(crate) struct MockIo {
        pub level: bool,
        pub analog: i32,
        pub analog_fails: bool,
        pub probe: Option<i32>,
        pub code: Option<u32>,
        pub cleared: u32,
    }

    impl SensorIo for MockIo {
        fn read_level(&mut self, _pin: u8) -> bool {
            self.level
        }

        fn read_analog(&mut self, _pin: u8) -> Option<i32> {
            (!self.analog_fails).then_some(self.analog)
        }

        fn read_probe(&mut self, _probe: Probe, _pin: u8) -> Option<i32> {
            self.probe
        }

        fn received_code(&mut self, _receiver: Receiver) -> Option<u32> {
            self.code
        }

        fn clear_code(&mut self, _receiver: Receiver) {
            self.code = None;
            self.cleared += 1;
        }
    }

    pub(crate) fn config(kind: SensorKind, threshold: i32) -> SensorConfig {
        SensorConfig {
            kind,
            name: "test",
            pin: 4,
            rest_level: false,
            start_delay: 0,
            threshold,
            action: TriggerAction::Intrusion,
        }
    }

    type Events = Vec<TriggerEvent, 8>;

    // ── Plain digital ───────────────────────────────────────────────

    #[test]
    fn digital_counts_on_departure_from_rest() {
        let mut s = Sensor::new(&config(SensorKind::Digital, 0));
        let mut io = MockIo::default();
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        io.level = true;
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        // still open: no new trigger
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].count, 1);
        assert_eq!(s.value(), 1);
    }

    #[test]
    fn digital_counts_each_new_departure() {
        let mut s = Sensor::new(&config(SensorKind::Digital, 0));
        let mut io = MockIo::default();
        let mut events = Events::new();

        for _ in 0..3 {
            io.level = true;
            s.evaluate(&mut io, &mut events);
            io.level = false;
            s.evaluate(&mut io, &mut events);
        }
        assert_eq!(s.count(), 3);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn digital_respects_high_rest_level() {
        let mut cfg = config(SensorKind::Digital, 0);
        cfg.rest_level = true;
        let mut s = Sensor::new(&cfg);
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        io.level = false;
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
    }

    // ── Debounced digital ───────────────────────────────────────────

    #[test]
    fn debounced_needs_confirming_read() {
        let mut s = Sensor::new(&config(SensorKind::DebouncedDigital, 0));
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        assert!(s.is_pending_recheck());
        assert_eq!(s.settle_timer(), RECHECK_DELAY);
        assert!(events.is_empty());

        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert!(!s.is_pending_recheck());
        assert_eq!(events.len(), 1);

        // stays active: latched, no further triggers
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn debounced_flicker_is_suppressed() {
        let mut s = Sensor::new(&config(SensorKind::DebouncedDigital, 0));
        let mut io = MockIo::default();
        let mut events = Events::new();

        io.level = true;
        s.evaluate(&mut io, &mut events);
        io.level = false;
        s.evaluate(&mut io, &mut events);

        assert_eq!(s.count(), 0);
        assert!(!s.is_pending_recheck());
        assert!(events.is_empty());

        // a later genuine detection still works
        io.level = true;
        s.evaluate(&mut io, &mut events);
        s.evaluate(&mut io, &mut events);
        assert_eq!(s.count(), 1);
    }

    #[test]
    fn debounced_waits_out_recheck_delay_via_tick() {
        let mut s = Sensor::new(&config(SensorKind::DebouncedDigital, 0));
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Events::new();

        s.evaluate(&mut io, &mut events);
        assert!(!s.is_ready());
        for _ in 0..RECHECK_DELAY {
            s.tick();
        }
        assert!(s.is_ready());
    }

    // ── Analog family ───────────────────────────────────────────────

    #[test]
    fn analog_counts_at_or_above_threshold() {
        let mut s = Sensor::new(&config(SensorKind::Analog, 500));
        let mut io = MockIo { analog: 499, ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        assert_eq!(s.value(), 499);
        io.analog = 500;
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        io.analog = 900;
        assert_eq!(s.evaluate(&mut io, &mut events), 2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].value, 900);
    }

    #[test]
    fn analog_rearms_sample_interval() {
        let mut s = Sensor::new(&config(SensorKind::Analog, 500));
        let mut io = MockIo::default();
        let mut events = Events::new();

        s.evaluate(&mut io, &mut events);
        assert_eq!(s.settle_timer(), ANALOG_SAMPLE_INTERVAL);
        assert!(!s.is_ready());
    }

    #[test]
    fn failed_analog_read_keeps_previous_value() {
        let mut s = Sensor::new(&config(SensorKind::Analog, 500));
        let mut io = MockIo { analog: 620, ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        io.analog_fails = true;
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(s.value(), 620);
        assert_eq!(events.len(), 1);
    }

    #[cfg(feature = "ds18b20")]
    #[test]
    fn missing_probe_keeps_previous_state() {
        let mut s = Sensor::new(&config(SensorKind::Ds18b20, 50));
        let mut io = MockIo { probe: Some(60), ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        io.probe = None;
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(s.value(), 60);
        assert_eq!(events.len(), 1);
    }

    // ── Code receivers ──────────────────────────────────────────────

    #[cfg(feature = "rf")]
    #[test]
    fn rf_code_match_latches_and_clears_receiver() {
        let mut s = Sensor::new(&config(SensorKind::RfCode, 0x00AB_CDEF));
        let mut io = MockIo { code: Some(0x1234), ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        assert_eq!(io.cleared, 0);

        io.code = Some(0x00AB_CDEF);
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(io.cleared, 1);
        assert_eq!(io.code, None);

        // nothing new received: count stays latched
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(events.len(), 1);
    }

    #[cfg(feature = "ir")]
    #[test]
    fn ir_code_match_latches_and_clears_receiver() {
        let mut s = Sensor::new(&config(SensorKind::IrCode, 0x00FF_A25D));
        let mut io = MockIo { code: Some(0x00FF_629D), ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        assert_eq!(io.cleared, 0);
        assert_eq!(s.value(), 0x00FF_629D);

        io.code = Some(0x00FF_A25D);
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(io.cleared, 1);
        assert_eq!(io.code, None);

        // unlike the remote, the count stays latched
        assert_eq!(s.evaluate(&mut io, &mut events), 1);
        assert_eq!(s.count(), 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].count, 1);
    }

    #[cfg(feature = "ir")]
    #[test]
    fn ir_remote_pulses_and_resets() {
        let mut s = Sensor::new(&config(SensorKind::IrRemote, 0x20DF_10EF_u32 as i32));
        let mut io = MockIo::default();
        let mut events = Events::new();

        for press in 1..=3 {
            io.code = Some(0x20DF_10EF);
            assert_eq!(s.evaluate(&mut io, &mut events), 0);
            assert_eq!(events.len(), press);
            assert_eq!(events[press - 1].count, 1);
        }
    }

    // ── Enable / reset ──────────────────────────────────────────────

    #[test]
    fn disabled_sensor_is_not_evaluated() {
        let mut s = Sensor::new(&config(SensorKind::Digital, 0));
        s.set_enabled(false);
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Events::new();

        assert_eq!(s.evaluate(&mut io, &mut events), 0);
        assert!(!s.is_ready());
        assert!(events.is_empty());
    }

    #[test]
    fn reset_count_clears_latched_trigger() {
        let mut s = Sensor::new(&config(SensorKind::Digital, 0));
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Events::new();

        s.evaluate(&mut io, &mut events);
        s.reset_count();
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn start_delay_holds_sensor_until_ticked() {
        let mut cfg = config(SensorKind::DebouncedDigital, 0);
        cfg.start_delay = 3;
        let mut s = Sensor::new(&cfg);
        assert!(!s.is_ready());
        s.tick();
        s.tick();
        assert!(!s.is_ready());
        s.tick();
        assert!(s.is_ready());
        s.tick();
        assert_eq!(s.settle_timer(), 0);
    }

    // ── describe ────────────────────────────────────────────────────

    #[test]
    fn describe_digital_shows_count_and_level() {
        let mut cfg = config(SensorKind::Digital, 0);
        cfg.name = "door";
        let mut s = Sensor::new(&cfg);
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Events::new();
        s.evaluate(&mut io, &mut events);

        let mut line = heapless::String::<32>::new();
        s.describe(&mut line).unwrap();
        assert_eq!(line.as_str(), "door:1(1) ");
    }

    #[test]
    fn describe_analog_shows_value() {
        let mut cfg = config(SensorKind::Analog, 1000);
        cfg.name = "gas";
        let mut s = Sensor::new(&cfg);
        let mut io = MockIo { analog: 312, ..Default::default() };
        let mut events = Events::new();
        s.evaluate(&mut io, &mut events);

        let mut line = heapless::String::<32>::new();
        s.describe(&mut line).unwrap();
        assert_eq!(line.as_str(), "gas:312 ");
    }

    #[cfg(feature = "thermistor")]
    #[test]
    fn describe_temperature_has_unit() {
        let mut cfg = config(SensorKind::Thermistor, 70);
        cfg.name = "boiler";
        let mut s = Sensor::new(&cfg);
        let mut io = MockIo { probe: Some(23), ..Default::default() };
        let mut events = Events::new();
        s.evaluate(&mut io, &mut events);

        let mut line = heapless::String::<32>::new();
        s.describe(&mut line).unwrap();
        assert_eq!(line.as_str(), "boiler:t=23C ");
    }

    #[test]
    fn describe_does_not_touch_state() {
        let s = Sensor::new(&config(SensorKind::DebouncedDigital, 0));
        let mut line = heapless::String::<32>::new();
        s.describe(&mut line).unwrap();
        s.describe(&mut line).unwrap();
        assert_eq!(s.count(), 0);
        assert!(!s.is_pending_recheck());
    }
}
