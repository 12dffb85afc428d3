/// Communication layer — the controller context shared by the polling loop
/// and the bus, plus the serial NDJSON helpers.
///
/// The companion module is the bus master. It writes bursts of commands and
/// free text ([`Controller::handle_receive`]) and reads one 32-byte frame per
/// request ([`Controller::build_frame`]). Everything both sides touch lives in
/// the [`Controller`]; see `shared` for the lock around it.
use core::fmt::{self, Write};

use heapless::{Deque, String};

use crate::flags::{Flag, GuardEdge, GuardFlags, ALL_FLAGS};
use crate::protocol::{
    self, CommandCode, CommandFrameParser, DeviceMessage, Segment, SensorSample, DATA_TAG,
    FLAG_NAMES_PREFIX, FRAME_LEN, MAX_MSG_LEN,
};
use crate::queue::{TextQueue, INBOUND_CAPACITY, OUTBOUND_CAPACITY};
use crate::registry::{SensorRegistry, SensorValues, ValueSnapshot};

/// Work the bus side hands to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Arm,
    Disarm,
    /// Write the sensor-name listing to the outbound queue
    ListSensorNames,
}

impl From<GuardEdge> for PendingAction {
    fn from(edge: GuardEdge) -> Self {
        match edge {
            GuardEdge::Armed => PendingAction::Arm,
            GuardEdge::Disarmed => PendingAction::Disarm,
        }
    }
}

const ACTION_QUEUE_LEN: usize = 4;

pub type InboundQueue = TextQueue<INBOUND_CAPACITY>;
pub type OutboundQueue = TextQueue<OUTBOUND_CAPACITY>;

pub struct Controller {
    flags: GuardFlags,
    inbound: InboundQueue,
    outbound: OutboundQueue,
    actions: Deque<PendingAction, ACTION_QUEUE_LEN>,
    values: ValueSnapshot,
}

impl Controller {
    pub const fn new(flags: u8) -> Self {
        Self {
            flags: GuardFlags::new(flags),
            inbound: TextQueue::new(),
            outbound: TextQueue::new(),
            actions: Deque::new(),
            values: ValueSnapshot::new(),
        }
    }

    // ── Bus receive ─────────────────────────────────────────────────

    /// Dispatch one burst written by the companion.
    pub fn handle_receive(&mut self, bytes: &[u8]) {
        for segment in CommandFrameParser::new(bytes) {
            match segment {
                Segment::Command(cmd) => self.dispatch(cmd.code, cmd.index),
                Segment::Text(b) => {
                    if !self.inbound.push(b) {
                        log::warn!("Inbound text queue full");
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, code: CommandCode, index: u8) {
        match code {
            CommandCode::ReadValue => {
                if !self.flags.is_armed() {
                    return;
                }
                let sample = SensorSample {
                    index,
                    value: self.values.value_or_sentinel(index as usize),
                };
                self.queue_record(&sample.encode());
            }
            CommandCode::SensorNames => {
                if self.flags.is_armed() {
                    self.queue_action(PendingAction::ListSensorNames);
                }
            }
            CommandCode::FlagNames => {
                let mut listing = String::<OUTBOUND_CAPACITY>::new();
                let _ = listing.push_str(FLAG_NAMES_PREFIX);
                for flag in ALL_FLAGS {
                    let _ = write!(listing, " {}", flag.as_str());
                }
                let _ = listing.push('\n');
                self.queue_record(listing.as_bytes());
            }
            CommandCode::Flags => {
                if let Some(edge) = self.flags.apply_wire(index) {
                    log::info!("Guard {:?} by companion", edge);
                    self.queue_action(edge.into());
                }
            }
        }
    }

    // ── Bus request ─────────────────────────────────────────────────

    /// Reply frame for one read request; drains the outbound queue.
    pub fn build_frame(&mut self) -> [u8; FRAME_LEN] {
        protocol::build_frame(self.flags.bits(), &mut self.outbound)
    }

    // ── Main-loop side ──────────────────────────────────────────────

    /// Copy the registry's current values for the bus side.
    pub fn publish(&mut self, registry: &SensorRegistry) {
        self.values.capture(registry);
    }

    /// Arm or disarm locally. Edges queue the same action a companion
    /// command would.
    pub fn set_guard(&mut self, armed: bool) -> Option<GuardEdge> {
        let edge = self.flags.set_guard(armed);
        if let Some(edge) = edge {
            log::info!("Guard {:?} locally", edge);
            self.queue_action(edge.into());
        }
        edge
    }

    /// Queue `bytes` whole, or drop all of it when the outbound queue
    /// lacks room. Returns whether it was queued.
    pub fn queue_record(&mut self, bytes: &[u8]) -> bool {
        if self.outbound.try_extend(bytes) {
            return true;
        }
        log::warn!(
            "Outbound queue full ({} free), {}-byte record dropped",
            self.outbound.free(),
            bytes.len()
        );
        false
    }

    /// Format one text line and queue it whole.
    pub fn queue_text(&mut self, args: fmt::Arguments) -> bool {
        let mut line = String::<OUTBOUND_CAPACITY>::new();
        if line.write_fmt(args).is_err() {
            log::warn!("Outbound line longer than {} bytes dropped", OUTBOUND_CAPACITY);
            return false;
        }
        self.queue_record(line.as_bytes())
    }

    /// Queue the sensor-name listing whole.
    pub fn queue_sensor_names(&mut self, registry: &SensorRegistry) -> bool {
        let mut listing = String::<OUTBOUND_CAPACITY>::new();
        if registry.write_names(&mut listing).is_err() {
            log::warn!("Sensor-name listing longer than {} bytes dropped", OUTBOUND_CAPACITY);
            return false;
        }
        self.queue_record(listing.as_bytes())
    }

    pub fn set_flag(&mut self, flag: Flag, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn flags(&self) -> GuardFlags {
        self.flags
    }

    pub fn take_action(&mut self) -> Option<PendingAction> {
        self.actions.pop_front()
    }

    pub fn outbound(&mut self) -> &mut OutboundQueue {
        &mut self.outbound
    }

    pub fn inbound(&mut self) -> &mut InboundQueue {
        &mut self.inbound
    }

    /// Bus-side value lookup, as answered to read-value commands.
    pub fn value_at(&self, index: usize) -> i32 {
        self.values.value_or_sentinel(index)
    }

    fn queue_action(&mut self, action: PendingAction) {
        if self.actions.push_back(action).is_err() {
            log::warn!("Action queue full, {:?} dropped", action);
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(0)
    }
}

// ── Companion watchdog ────────────────────────────────────────────────

/// Detects a companion that stopped polling the bus.
///
/// `feed` on every read request; `poll` from the main loop. Timestamps are
/// milliseconds from any monotonic clock and may wrap.
pub struct BusWatchdog {
    timeout_ms: u32,
    last_request_ms: u32,
    online: bool,
}

impl BusWatchdog {
    pub const fn new(timeout_ms: u32, now_ms: u32) -> Self {
        Self {
            timeout_ms,
            last_request_ms: now_ms,
            online: false,
        }
    }

    pub fn feed(&mut self, now_ms: u32) {
        self.last_request_ms = now_ms;
        self.online = true;
    }

    /// Returns `true` once per silent timeout; the caller resets the
    /// companion. The timer restarts so the reset gets time to take effect.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_request_ms) <= self.timeout_ms {
            return false;
        }
        self.last_request_ms = now_ms;
        self.online = false;
        true
    }

    /// Whether the companion has polled since the last reset
    pub fn is_online(&self) -> bool {
        self.online
    }
}

// ── Serial NDJSON ─────────────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Serialize into a fresh [`MsgBuffer`](protocol::MsgBuffer).
pub fn encode_message(msg: &DeviceMessage) -> Option<protocol::MsgBuffer> {
    let mut buf = protocol::MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok();
    let len = serialize_message(msg, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}

/// Line accumulator for the inbound text queue.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; INBOUND_CAPACITY],
    pos: usize,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; INBOUND_CAPACITY],
            pos: 0,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            if self.pos > 0 {
                let line = &self.buf[..self.pos];
                self.pos = 0;
                Some(line)
            } else {
                None
            }
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: discard and reset
            self.pos = 0;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}
