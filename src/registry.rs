/// Indexed sensor collection.
///
/// The bus addresses sensors by their position in the compiled-in table.
/// Lookups are bounds-checked: an unknown index yields
/// [`RegistryError::IndexOutOfRange`] and callers fall back to
/// [`VALUE_SENTINEL`].
use core::fmt::{self, Write};

use heapless::Vec;

use crate::alarm::TriggerSink;
use crate::defaults::MAX_SENSORS;
use crate::sensor::{Sensor, SensorConfig, SensorIo};

/// Value reported for an index that names no sensor.
pub const VALUE_SENTINEL: i32 = i16::MIN as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("sensor index {index} out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Read access to sensor values by bus index.
pub trait SensorValues {
    fn value_at(&self, index: usize) -> Result<i32, RegistryError>;

    /// `value_at`, with the sentinel standing in for a bad index.
    fn value_or_sentinel(&self, index: usize) -> i32 {
        match self.value_at(index) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("{}", e);
                VALUE_SENTINEL
            }
        }
    }
}

pub struct SensorRegistry {
    sensors: Vec<Sensor, MAX_SENSORS>,
}

impl SensorRegistry {
    pub const fn new() -> Self {
        Self { sensors: Vec::new() }
    }

    /// Build from a sensor table. Entries beyond [`MAX_SENSORS`] are skipped.
    pub fn from_config(table: &[SensorConfig]) -> Self {
        let mut registry = Self::new();
        for config in table {
            if registry.add(Sensor::new(config)).is_err() {
                log::warn!("Sensor table exceeds {} entries, '{}' skipped", MAX_SENSORS, config.name);
            }
        }
        registry
    }

    /// Append a sensor; returns its bus index.
    pub fn add(&mut self, sensor: Sensor) -> Result<usize, Sensor> {
        self.sensors.push(sensor)?;
        Ok(self.sensors.len() - 1)
    }

    /// Evaluate every sensor that is enabled and not settling.
    pub fn poll<IO, S>(&mut self, io: &mut IO, sink: &mut S)
    where
        IO: SensorIo,
        S: TriggerSink,
    {
        for sensor in self.sensors.iter_mut().filter(|s| s.is_ready()) {
            sensor.evaluate(io, sink);
        }
    }

    /// Advance every settle/warm-up countdown by one time unit.
    pub fn tick(&mut self) {
        for sensor in self.sensors.iter_mut() {
            sensor.tick();
        }
    }

    pub fn reset_counts(&mut self) {
        for sensor in self.sensors.iter_mut() {
            sensor.reset_count();
        }
    }

    /// One `describe` fragment per sensor, in index order.
    pub fn describe_all<W: Write>(&self, out: &mut W) -> fmt::Result {
        for sensor in &self.sensors {
            sensor.describe(out)?;
        }
        Ok(())
    }

    /// Name listing requested over the bus: `SENSORS: a b c\n`.
    pub fn write_names<W: Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str(crate::protocol::SENSOR_NAMES_PREFIX)?;
        for sensor in &self.sensors {
            write!(out, " {}", sensor.name())?;
        }
        out.write_char('\n')
    }

    pub fn get(&self, index: usize) -> Option<&Sensor> {
        self.sensors.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Sensor> {
        self.sensors.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorValues for SensorRegistry {
    fn value_at(&self, index: usize) -> Result<i32, RegistryError> {
        self.sensors
            .get(index)
            .map(Sensor::value)
            .ok_or(RegistryError::IndexOutOfRange {
                index,
                len: self.sensors.len(),
            })
    }
}

/// Copy of the registry's values, held by the controller so the bus side
/// never reaches into the registry the polling loop owns.
#[derive(Debug, Clone, Default)]
pub struct ValueSnapshot {
    values: Vec<i32, MAX_SENSORS>,
}

impl ValueSnapshot {
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn capture(&mut self, registry: &SensorRegistry) {
        self.values.clear();
        for sensor in registry.iter() {
            // capacities match, cannot fail
            let _ = self.values.push(sensor.value());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SensorValues for ValueSnapshot {
    fn value_at(&self, index: usize) -> Result<i32, RegistryError> {
        self.values
            .get(index)
            .copied()
            .ok_or(RegistryError::IndexOutOfRange {
                index,
                len: self.values.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{TriggerAction, TriggerEvent};
    use crate::sensor::tests::{config, MockIo};
    use crate::sensor::SensorKind;

    fn table() -> [SensorConfig; 3] {
        let mut door = config(SensorKind::Digital, 0);
        door.name = "door";
        let mut gas = config(SensorKind::Analog, 600);
        gas.name = "gas";
        gas.action = TriggerAction::Notify;
        let mut pir = config(SensorKind::DebouncedDigital, 0);
        pir.name = "pir";
        pir.start_delay = 2;
        [door, gas, pir]
    }

    // ── value_at ────────────────────────────────────────────────────

    #[test]
    fn value_at_in_range() {
        let mut reg = SensorRegistry::from_config(&table());
        let mut io = MockIo { analog: 37, ..Default::default() };
        let mut events = Vec::<TriggerEvent, 4>::new();
        reg.poll(&mut io, &mut events);
        assert_eq!(reg.value_at(1), Ok(37));
    }

    #[test]
    fn value_at_out_of_range_is_error() {
        let reg = SensorRegistry::from_config(&table());
        assert_eq!(
            reg.value_at(3),
            Err(RegistryError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(reg.value_or_sentinel(200), VALUE_SENTINEL);
    }

    #[test]
    fn empty_registry_rejects_every_index() {
        let reg = SensorRegistry::new();
        assert!(reg.value_at(0).is_err());
    }

    #[test]
    fn table_larger_than_capacity_is_truncated() {
        let many = [config(SensorKind::Digital, 0); MAX_SENSORS + 4];
        let reg = SensorRegistry::from_config(&many);
        assert_eq!(reg.len(), MAX_SENSORS);
    }

    // ── poll / tick ─────────────────────────────────────────────────

    #[test]
    fn poll_skips_sensors_in_warm_up() {
        let mut reg = SensorRegistry::from_config(&table());
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Vec::<TriggerEvent, 4>::new();

        reg.poll(&mut io, &mut events);
        // door fired, pir still warming up
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sensor, "door");
        assert!(!reg.get(2).unwrap().is_pending_recheck());

        reg.tick();
        reg.tick();
        reg.poll(&mut io, &mut events);
        assert!(reg.get(2).unwrap().is_pending_recheck());
    }

    #[test]
    fn debounced_detection_confirmed_after_recheck_delay() {
        let mut pir = config(SensorKind::DebouncedDigital, 0);
        pir.name = "pir";
        let mut reg = SensorRegistry::from_config(&[pir]);
        let mut io = MockIo { level: true, ..Default::default() };
        let mut events = Vec::<TriggerEvent, 4>::new();

        reg.poll(&mut io, &mut events);
        // polls during the recheck window do nothing
        for _ in 0..5 {
            reg.poll(&mut io, &mut events);
        }
        assert!(events.is_empty());

        for _ in 0..crate::defaults::RECHECK_DELAY {
            reg.tick();
        }
        reg.poll(&mut io, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(reg.get(0).unwrap().count(), 1);
    }

    #[test]
    fn reset_counts_clears_all() {
        let mut reg = SensorRegistry::from_config(&table());
        let mut io = MockIo { level: true, analog: 900, ..Default::default() };
        let mut events = Vec::<TriggerEvent, 4>::new();
        reg.poll(&mut io, &mut events);
        assert!(reg.iter().any(|s| s.count() > 0));
        reg.reset_counts();
        assert!(reg.iter().all(|s| s.count() == 0));
    }

    // ── Reports ─────────────────────────────────────────────────────

    #[test]
    fn write_names_lists_in_index_order() {
        let reg = SensorRegistry::from_config(&table());
        let mut out = heapless::String::<64>::new();
        reg.write_names(&mut out).unwrap();
        assert_eq!(out.as_str(), "SENSORS: door gas pir\n");
    }

    #[test]
    fn describe_all_concatenates_fragments() {
        let reg = SensorRegistry::from_config(&table());
        let mut out = heapless::String::<64>::new();
        reg.describe_all(&mut out).unwrap();
        assert_eq!(out.as_str(), "door:0(0) gas:0 pir:0(0) ");
    }

    // ── Snapshot ────────────────────────────────────────────────────

    #[test]
    fn snapshot_mirrors_registry() {
        let mut reg = SensorRegistry::from_config(&table());
        let mut io = MockIo { analog: 412, ..Default::default() };
        let mut events = Vec::<TriggerEvent, 4>::new();
        reg.poll(&mut io, &mut events);

        let mut snap = ValueSnapshot::new();
        snap.capture(&reg);
        assert_eq!(snap.len(), reg.len());
        for i in 0..reg.len() {
            assert_eq!(snap.value_at(i), reg.value_at(i));
        }
        assert!(snap.value_at(reg.len()).is_err());
    }
}
