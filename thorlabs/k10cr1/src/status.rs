//! Decoding of the 32 bit status word of the K10CR1.

use std::fmt::Display;

/// A flag of the status word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    /// Clockwise hardware limit switch is active.
    CwHardwareLimit,
    /// Counterclockwise hardware limit switch is active.
    CcwHardwareLimit,
    /// Clockwise software limit is reached.
    CwSoftwareLimit,
    /// Counterclockwise software limit is reached.
    CcwSoftwareLimit,
    /// Motor shaft is moving clockwise.
    MovingCw,
    /// Motor shaft is moving counterclockwise.
    MovingCcw,
    /// Motor shaft is jogging clockwise.
    JoggingCw,
    /// Motor shaft is jogging counterclockwise.
    JoggingCcw,
    /// Motor is connected.
    Connected,
    /// Motor is homing.
    Homing,
    /// Motor is homed.
    Homed,
    /// Digital input 1 is high.
    DigitalInput1,
    /// Digital input 2 is high.
    DigitalInput2,
    /// Digital input 3 is high.
    DigitalInput3,
    /// Digital input 4 is high.
    DigitalInput4,
    /// Digital input 5 is high.
    DigitalInput5,
    /// Digital input 6 is high.
    DigitalInput6,
    /// Motor is active.
    Active,
    /// Channel is enabled.
    ChannelEnabled,
}

impl StatusFlag {
    /// All flags, in order of their bit position.
    pub const ALL: [StatusFlag; 19] = [
        StatusFlag::CwHardwareLimit,
        StatusFlag::CcwHardwareLimit,
        StatusFlag::CwSoftwareLimit,
        StatusFlag::CcwSoftwareLimit,
        StatusFlag::MovingCw,
        StatusFlag::MovingCcw,
        StatusFlag::JoggingCw,
        StatusFlag::JoggingCcw,
        StatusFlag::Connected,
        StatusFlag::Homing,
        StatusFlag::Homed,
        StatusFlag::DigitalInput1,
        StatusFlag::DigitalInput2,
        StatusFlag::DigitalInput3,
        StatusFlag::DigitalInput4,
        StatusFlag::DigitalInput5,
        StatusFlag::DigitalInput6,
        StatusFlag::Active,
        StatusFlag::ChannelEnabled,
    ];

    /// Bit position of the flag in the status word.
    pub fn bit(&self) -> u32 {
        match self {
            StatusFlag::CwHardwareLimit => 0,
            StatusFlag::CcwHardwareLimit => 1,
            StatusFlag::CwSoftwareLimit => 2,
            StatusFlag::CcwSoftwareLimit => 3,
            StatusFlag::MovingCw => 4,
            StatusFlag::MovingCcw => 5,
            StatusFlag::JoggingCw => 6,
            StatusFlag::JoggingCcw => 7,
            StatusFlag::Connected => 8,
            StatusFlag::Homing => 9,
            StatusFlag::Homed => 10,
            StatusFlag::DigitalInput1 => 20,
            StatusFlag::DigitalInput2 => 21,
            StatusFlag::DigitalInput3 => 22,
            StatusFlag::DigitalInput4 => 23,
            StatusFlag::DigitalInput5 => 24,
            StatusFlag::DigitalInput6 => 25,
            StatusFlag::Active => 29,
            StatusFlag::ChannelEnabled => 31,
        }
    }
}

impl Display for StatusFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Status of the rotation mount, decoded from the status word.
///
/// Bits that are not mapped to a [`StatusFlag`] are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    bits: u32,
}

impl Status {
    /// Decode a status word.
    pub fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// The raw status word.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Is the given flag set?
    pub fn is_set(&self, flag: StatusFlag) -> bool {
        (self.bits >> flag.bit()) & 1 == 1
    }

    /// All flags that are set.
    pub fn flags(&self) -> Vec<StatusFlag> {
        StatusFlag::ALL
            .into_iter()
            .filter(|flag| self.is_set(*flag))
            .collect()
    }

    /// Is the motor moving or jogging in any direction?
    pub fn is_moving(&self) -> bool {
        [
            StatusFlag::MovingCw,
            StatusFlag::MovingCcw,
            StatusFlag::JoggingCw,
            StatusFlag::JoggingCcw,
        ]
        .into_iter()
        .any(|flag| self.is_set(flag))
    }

    /// Is the motor homed?
    pub fn is_homed(&self) -> bool {
        self.is_set(StatusFlag::Homed)
    }
}
