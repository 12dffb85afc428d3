/// Alarm responses to confirmed sensor triggers.
///
/// Sensors do not call into alarm logic directly. Each trigger becomes a
/// [`TriggerEvent`] handed to a [`TriggerSink`]; the firmware collects them
/// and runs [`handle_trigger`] against the controller, which raises the
/// alarm flag, queues the notification text for the companion module, or
/// toggles the guard.
use heapless::Vec;

use crate::comm::Controller;
use crate::flags::{Flag, GuardEdge};

/// What a sensor's trigger means to the alarm system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Break-in: siren and report, only while armed
    Intrusion,
    /// Hazard reading: report regardless of guard state
    Notify,
    /// Remote button: arm when disarmed, disarm when armed
    ToggleGuard,
}

impl TriggerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerAction::Intrusion => "intrusion",
            TriggerAction::Notify => "notify",
            TriggerAction::ToggleGuard => "toggle_guard",
        }
    }
}

/// A confirmed trigger, produced at most once per sensor per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub sensor: &'static str,
    pub action: TriggerAction,
    /// Trigger count after this event
    pub count: u16,
    /// Reading that caused the trigger
    pub value: i32,
}

/// Receives trigger events from sensor evaluation.
pub trait TriggerSink {
    fn on_trigger(&mut self, event: TriggerEvent);
}

/// Event queue: the polling loop drains it after each pass.
impl<const N: usize> TriggerSink for Vec<TriggerEvent, N> {
    fn on_trigger(&mut self, event: TriggerEvent) {
        if self.push(event).is_err() {
            log::warn!("Trigger queue full, '{}' event dropped", event.sensor);
        }
    }
}

/// Outcome of [`handle_trigger`], for the firmware's output side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmResponse {
    /// Intrusion while armed: sound the siren
    Siren,
    /// Notification queued for the companion
    Notified,
    /// Guard toggled
    GuardChanged(GuardEdge),
    /// Nothing to do (intrusion while disarmed)
    Ignored,
}

/// Apply one trigger event to the controller.
pub fn handle_trigger(ctl: &mut Controller, event: &TriggerEvent) -> AlarmResponse {
    match event.action {
        TriggerAction::Intrusion => {
            if !ctl.flags().is_armed() {
                log::debug!("'{}' triggered while disarmed", event.sensor);
                return AlarmResponse::Ignored;
            }
            ctl.set_flag(Flag::Alarm, true);
            ctl.queue_text(format_args!("ALARM {}:{}\n", event.sensor, event.count));
            log::warn!("ALARM: {} (count {})", event.sensor, event.count);
            AlarmResponse::Siren
        }
        TriggerAction::Notify => {
            ctl.queue_text(format_args!("NOTE {}:{}\n", event.sensor, event.value));
            log::info!("{} reading {} over threshold", event.sensor, event.value);
            AlarmResponse::Notified
        }
        TriggerAction::ToggleGuard => {
            let armed = ctl.flags().is_armed();
            match ctl.set_guard(!armed) {
                Some(edge) => AlarmResponse::GuardChanged(edge),
                None => AlarmResponse::Ignored,
            }
        }
    }
}
