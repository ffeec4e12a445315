//! Health and arming check events.
//!
//! An event is an id, a packed severity pair and a fixed-size argument
//! payload. The human-readable message never travels with the event; the
//! ground station resolves it from the id.

use serde::{Deserialize, Serialize};

/// Size in bytes of the argument payload attached to each event.
pub const EVENT_ARGUMENTS_LEN: usize = 25;

/// Derive a stable event id from its name.
///
/// FNV-1a over the name bytes, truncated to 24 bits, tagged with the
/// "custom component" bit.
///
/// ```
/// use skymode_types::event_id;
///
/// const LOW_BATTERY: u32 = event_id("orbit_low_battery");
/// assert_eq!(LOW_BATTERY >> 24, 1);
/// assert_eq!(LOW_BATTERY, event_id("orbit_low_battery"));
/// ```
pub const fn event_id(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash: u32 = 0x811c_9dc5;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    (1 << 24) | (hash & 0x00ff_ffff)
}

// ────────────────────────────────────────────────────────────────────────────
// Severities
// ────────────────────────────────────────────────────────────────────────────

/// Syslog-style severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
    Protocol = 8,
    Disabled = 9,
}

/// Severity pair: what the pilot sees (`external`) and what is logged
/// on board (`internal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogLevels {
    pub external: LogLevel,
    pub internal: LogLevel,
}

impl LogLevels {
    pub fn new(external: LogLevel, internal: LogLevel) -> Self {
        Self { external, internal }
    }

    /// Both sides at the same level.
    pub fn uniform(level: LogLevel) -> Self {
        Self::new(level, level)
    }

    /// Packed representation: internal level in the high nibble.
    pub fn packed(self) -> u8 {
        ((self.internal as u8) << 4) | self.external as u8
    }
}

impl From<LogLevel> for LogLevels {
    fn from(level: LogLevel) -> Self {
        Self::uniform(level)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Argument encoding
// ────────────────────────────────────────────────────────────────────────────

/// A single primitive event argument, encoded little-endian.
pub trait EventArgument: Copy {
    const SIZE: usize;

    /// Write `SIZE` bytes at the start of `out`.
    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_event_argument {
    ($($t:ty),*) => {
        $(
            impl EventArgument for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_le(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_event_argument!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// A tuple of [`EventArgument`]s that fits into the fixed payload.
///
/// Exceeding [`EVENT_ARGUMENTS_LEN`] is rejected when the encoding is
/// instantiated, not at runtime.
pub trait EventArguments {
    const SIZE: usize;

    fn encode(self, out: &mut [u8; EVENT_ARGUMENTS_LEN]);
}

impl EventArguments for () {
    const SIZE: usize = 0;

    fn encode(self, _out: &mut [u8; EVENT_ARGUMENTS_LEN]) {}
}

macro_rules! impl_event_arguments {
    ($($t:ident $v:ident),+) => {
        impl<$($t: EventArgument),+> EventArguments for ($($t,)+) {
            const SIZE: usize = 0 $(+ <$t as EventArgument>::SIZE)+;

            fn encode(self, out: &mut [u8; EVENT_ARGUMENTS_LEN]) {
                const { assert!(Self::SIZE <= EVENT_ARGUMENTS_LEN, "too many event arguments") };
                let ($($v,)+) = self;
                let mut offset = 0;
                $(
                    $v.write_le(&mut out[offset..]);
                    offset += <$t as EventArgument>::SIZE;
                )+
                let _ = offset;
            }
        }
    };
}

impl_event_arguments!(A a);
impl_event_arguments!(A a, B b);
impl_event_arguments!(A a, B b, C c);
impl_event_arguments!(A a, B b, C c, D d);

// ────────────────────────────────────────────────────────────────────────────
// EventType
// ────────────────────────────────────────────────────────────────────────────

/// One encoded event slot of an arming check reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType {
    pub id: u32,
    pub log_levels: u8,
    pub arguments: [u8; EVENT_ARGUMENTS_LEN],
}

impl EventType {
    pub const EMPTY: EventType = EventType {
        id: 0,
        log_levels: 0,
        arguments: [0; EVENT_ARGUMENTS_LEN],
    };

    pub fn new<A: EventArguments>(id: u32, log_levels: LogLevels, args: A) -> Self {
        let mut event = Self {
            id,
            log_levels: log_levels.packed(),
            ..Self::EMPTY
        };
        args.encode(&mut event.arguments);
        event
    }
}

impl Default for EventType {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_is_deterministic_and_tagged() {
        let a = event_id("check_failed");
        assert_eq!(a, event_id("check_failed"));
        assert_ne!(a, event_id("check_passed"));
        assert_eq!(a & 0xff00_0000, 1 << 24);
    }

    #[test]
    fn log_levels_packing() {
        let levels = LogLevels::new(LogLevel::Error, LogLevel::Info);
        assert_eq!(levels.packed(), (6 << 4) | 3);
        assert_eq!(LogLevels::from(LogLevel::Warning).packed(), 0x44);
    }

    #[test]
    fn arguments_are_little_endian_and_sequential() {
        let event = EventType::new(7, LogLevel::Critical.into(), (0x0102u16, 3u8, -1i32));
        assert_eq!(&event.arguments[..7], &[0x02, 0x01, 3, 0xff, 0xff, 0xff, 0xff]);
        assert!(event.arguments[7..].iter().all(|b| *b == 0));
    }

    #[test]
    fn argument_sizes_add_up() {
        assert_eq!(<() as EventArguments>::SIZE, 0);
        assert_eq!(<(f32, u8) as EventArguments>::SIZE, 5);
        assert_eq!(<(f64, f64, f64) as EventArguments>::SIZE, 24);
    }

    #[test]
    fn float_argument_encoding() {
        let event = EventType::new(1, LogLevel::Info.into(), (1.5f32,));
        assert_eq!(&event.arguments[..4], &1.5f32.to_le_bytes());
    }
}
