/// Wire formats.
///
/// Two protocols live here:
/// - the binary bus protocol with the companion module: 3-byte command
///   headers mixed with free text on the way in, fixed 32-byte frames on the
///   way out;
/// - the NDJSON status messages written to the serial console, serialized
///   with `serde_json_core` like every other device message.
use serde::Serialize;

use crate::queue::TextQueue;

// ── Bus protocol ─────────────────────────────────────────────────────

/// Marks the start of a command header; any other leading byte is text.
pub const DATA_TAG: u8 = 0x10;

/// Size of a command header on the wire
pub const HEADER_LEN: usize = 3;

/// Reply frame size; the companion always reads exactly this many bytes.
pub const FRAME_LEN: usize = 32;

/// Position of the flags byte in a reply frame
pub const FLAGS_OFFSET: usize = 2;

/// Payload bytes per reply frame (frame minus 2 start, 1 flags, 2 end)
pub const FRAME_PAYLOAD: usize = 27;

pub const START_BYTE: u8 = 0x02;
pub const END_BYTE: u8 = 0x03;

/// Prefix of the flag-name listing
pub const FLAG_NAMES_PREFIX: &str = "FLAGS:";

/// Prefix of the sensor-name listing
pub const SENSOR_NAMES_PREFIX: &str = "SENSORS:";

/// Command codes understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Queue a sample record for the sensor at `index` (armed only)
    ReadValue,
    /// Ask the main loop to list sensor names (armed only)
    SensorNames,
    /// Queue the flag-name listing
    FlagNames,
    /// Replace the flags byte with `index`
    Flags,
}

impl CommandCode {
    pub const fn to_byte(self) -> u8 {
        match self {
            CommandCode::ReadValue => 0x01,
            CommandCode::SensorNames => 0x02,
            CommandCode::FlagNames => 0x03,
            CommandCode::Flags => 0x04,
        }
    }

    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(CommandCode::ReadValue),
            0x02 => Some(CommandCode::SensorNames),
            0x03 => Some(CommandCode::FlagNames),
            0x04 => Some(CommandCode::Flags),
            _ => None,
        }
    }

    /// Bytes the command occupies on the wire. Flag commands are followed by
    /// a second, unused header-sized block that the companion always sends.
    pub const fn wire_len(self) -> usize {
        match self {
            CommandCode::ReadValue | CommandCode::SensorNames => HEADER_LEN,
            CommandCode::FlagNames | CommandCode::Flags => 2 * HEADER_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated header: {0} bytes")]
    Truncated(usize),
    #[error("byte {0:#04x} is not a data tag")]
    NotData(u8),
    #[error("unknown command code {0:#04x}")]
    UnknownCode(u8),
}

/// A decoded command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub code: CommandCode,
    /// Sensor index, or the new flags byte for [`CommandCode::Flags`]
    pub index: u8,
}

impl Command {
    /// Decode the header at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let &[tag, code, index, ..] = bytes else {
            return Err(DecodeError::Truncated(bytes.len()));
        };
        if tag != DATA_TAG {
            return Err(DecodeError::NotData(tag));
        }
        let code = CommandCode::from_byte(code).ok_or(DecodeError::UnknownCode(code))?;
        Ok(Self { code, index })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        [DATA_TAG, self.code.to_byte(), self.index]
    }
}

/// One unit of an inbound burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Command(Command),
    Text(u8),
}

/// Splits an inbound burst into commands and text bytes, left to right.
///
/// A command is recognised only where a full header with the data tag and a
/// known code starts; every other byte comes out as text, one at a time.
pub struct CommandFrameParser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CommandFrameParser<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl Iterator for CommandFrameParser<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let rest = &self.buf[self.pos..];
        let &first = rest.first()?;

        match Command::decode(rest) {
            Ok(cmd) => {
                // a trailing flag command may arrive without its second block
                self.pos += cmd.code.wire_len().min(rest.len());
                Some(Segment::Command(cmd))
            }
            Err(_) => {
                self.pos += 1;
                Some(Segment::Text(first))
            }
        }
    }
}

/// Sample record queued in answer to [`CommandCode::ReadValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub index: u8,
    pub value: i32,
}

impl SensorSample {
    pub const WIRE_LEN: usize = 4;

    /// `[DATA_TAG, index, value_lo, value_hi]`. The value is sent as a
    /// little-endian `i16`, clamped.
    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let v = self.value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let [lo, hi] = v.to_le_bytes();
        [DATA_TAG, self.index, lo, hi]
    }
}

/// Build the reply frame for one bus read request.
///
/// Layout: `[START, START, flags, payload.., END, END]`. Up to
/// [`FRAME_PAYLOAD`] bytes are drained from `outbound`; unused payload bytes
/// are zero.
pub fn build_frame<const N: usize>(flags: u8, outbound: &mut TextQueue<N>) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = START_BYTE;
    frame[1] = START_BYTE;
    frame[FLAGS_OFFSET] = flags;
    outbound.drain_into(&mut frame[3..3 + FRAME_PAYLOAD]);
    frame[FRAME_LEN - 2] = END_BYTE;
    frame[FRAME_LEN - 1] = END_BYTE;
    frame
}

// ── Console messages ─────────────────────────────────────────────────

/// Messages written to the serial console as NDJSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Periodic controller status
    #[serde(rename = "status")]
    Status {
        armed: bool,
        alarm: bool,
        /// Raw flags byte
        flags: u8,
        /// Number of configured sensors
        sensors: u8,
        /// Whether the companion module is polling the bus
        companion: bool,
        /// Uptime in seconds
        uptime: u32,
        board: &'static str,
        version: &'static str,
    },
    /// A sensor trigger
    #[serde(rename = "trigger")]
    Trigger {
        sensor: &'a str,
        /// "intrusion", "notify", "toggle_guard"
        action: &'static str,
        count: u16,
        value: i32,
        /// Uptime in milliseconds when the trigger fired
        ts: u32,
    },
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = heapless::Vec<u8, MAX_MSG_LEN>;
