/// Guard flags — the one-byte state shared with the companion module.
///
/// The byte travels as-is in every reply frame and is overwritten by the
/// companion's set-flags command. Only `GUARD_ENABLE` carries side effects:
/// its transitions are edge-detected so arming and disarming fire exactly
/// once per change.

/// A named bit in the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// An intrusion trigger fired while armed
    Alarm,
    /// Armed state
    GuardEnable,
    /// Companion may report by e-mail
    Email,
    /// Companion may report over GPRS
    Gprs,
    /// Companion may report by SMS
    Sms,
    /// Companion may report by voice call
    Ring,
}

/// Flags in bit order. The flag-name listing sent over the bus follows
/// this order, so it must stay in sync with [`Flag::bit`].
pub const ALL_FLAGS: [Flag; 6] = [
    Flag::Alarm,
    Flag::GuardEnable,
    Flag::Email,
    Flag::Gprs,
    Flag::Sms,
    Flag::Ring,
];

impl Flag {
    pub const fn bit(self) -> u8 {
        match self {
            Flag::Alarm => 0,
            Flag::GuardEnable => 1,
            Flag::Email => 2,
            Flag::Gprs => 3,
            Flag::Sms => 4,
            Flag::Ring => 5,
        }
    }

    pub const fn mask(self) -> u8 {
        1 << self.bit()
    }

    /// Name used in the flag-name listing
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Alarm => "ALARM",
            Flag::GuardEnable => "GUARD",
            Flag::Email => "EMAIL",
            Flag::Gprs => "GPRS",
            Flag::Sms => "SMS",
            Flag::Ring => "RING",
        }
    }
}

/// A `GUARD_ENABLE` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEdge {
    /// disarmed → armed
    Armed,
    /// armed → disarmed
    Disarmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardFlags(u8);

impl GuardFlags {
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_set(self, flag: Flag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn is_armed(self) -> bool {
        self.is_set(Flag::GuardEnable)
    }

    /// Set or clear a non-guard flag. Guard changes go through
    /// [`set_guard`](Self::set_guard) so the edge is not lost.
    pub fn set(&mut self, flag: Flag, on: bool) {
        debug_assert!(flag != Flag::GuardEnable, "use set_guard");
        self.write_bit(flag, on);
    }

    /// Arm or disarm. Returns the edge, or `None` if nothing changed.
    pub fn set_guard(&mut self, armed: bool) -> Option<GuardEdge> {
        let edge = match (self.is_armed(), armed) {
            (false, true) => Some(GuardEdge::Armed),
            (true, false) => Some(GuardEdge::Disarmed),
            _ => None,
        };
        self.write_bit(Flag::GuardEnable, armed);
        edge
    }

    /// Replace the whole byte with one received from the companion.
    ///
    /// The guard bit of `incoming` is compared against the current state;
    /// a change yields the edge. The stored byte is always `incoming`.
    pub fn apply_wire(&mut self, incoming: u8) -> Option<GuardEdge> {
        let wanted = incoming & Flag::GuardEnable.mask() != 0;
        let edge = self.set_guard(wanted);
        self.0 = incoming;
        edge
    }

    fn write_bit(&mut self, flag: Flag, on: bool) {
        if on {
            self.0 |= flag.mask();
        } else {
            self.0 &= !flag.mask();
        }
    }
}
