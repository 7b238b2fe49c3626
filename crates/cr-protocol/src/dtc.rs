use std::fmt;

use serde::{Deserialize, Serialize};

/// OBD-II Diagnostic Trouble Code as read from the vehicle.
///
/// Structural value: two codes are equal when letter, number and kind match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Subsystem letter (P, C, B, U).
    pub letter: DtcLetter,
    /// Numeric part, rendered as four hex digits (e.g. 0x0415 → "0415").
    pub code: u16,
    /// Lifecycle state reported by the ECU.
    pub kind: DtcKind,
}

/// Subsystem letter of a DTC, taken from the top two bits of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtcLetter {
    /// P: Powertrain (engine, transmission).
    P,
    /// C: Chassis (ABS, steering).
    C,
    /// B: Body (airbags, AC, lighting).
    B,
    /// U: Network/Communication (CAN bus errors).
    U,
}

/// Lifecycle state of a DTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtcKind {
    /// Confirmed, currently active (service 0x03).
    Stored,
    /// Detected on the current or last drive cycle, not yet confirmed (service 0x07).
    Pending,
    /// Permanent record of an issue that was cleared or healed (service 0x0A).
    Cleared,
}

impl DtcLetter {
    /// Letter for the two category bits of the first DTC byte.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => DtcLetter::P,
            1 => DtcLetter::C,
            2 => DtcLetter::B,
            _ => DtcLetter::U,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            DtcLetter::P => 'P',
            DtcLetter::C => 'C',
            DtcLetter::B => 'B',
            DtcLetter::U => 'U',
        }
    }

    /// Parse an uppercase letter. Lowercase is rejected because the
    /// canonical encoding is case-sensitive.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'P' => Some(DtcLetter::P),
            'C' => Some(DtcLetter::C),
            'B' => Some(DtcLetter::B),
            'U' => Some(DtcLetter::U),
            _ => None,
        }
    }
}

impl DtcKind {
    /// Single-character suffix used in the canonical encoding.
    pub fn suffix(self) -> char {
        match self {
            DtcKind::Stored => 's',
            DtcKind::Pending => 'p',
            DtcKind::Cleared => 'c',
        }
    }

    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            's' => Some(DtcKind::Stored),
            'p' => Some(DtcKind::Pending),
            'c' => Some(DtcKind::Cleared),
            _ => None,
        }
    }

    /// Human-readable description used in log output.
    pub fn describe(self) -> &'static str {
        match self {
            DtcKind::Stored => "current issue",
            DtcKind::Pending => "pending issue",
            DtcKind::Cleared => "cleared issue",
        }
    }
}

impl DiagnosticCode {
    pub fn new(letter: DtcLetter, code: u16, kind: DtcKind) -> Self {
        Self { letter, code, kind }
    }

    /// Decode the two raw bytes an ECU reports for one DTC.
    ///
    /// Returns `None` for the `0x00 0x00` padding pair.
    pub fn from_bytes(b1: u8, b2: u8, kind: DtcKind) -> Option<Self> {
        if b1 == 0x00 && b2 == 0x00 {
            return None;
        }
        let letter = DtcLetter::from_bits(b1 >> 6);
        let code = (u16::from(b1 & 0x3F) << 8) | u16::from(b2);
        Some(Self { letter, code, kind })
    }
}

impl fmt::Display for DtcLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Displays the code without its kind suffix, e.g. `P0415`.
impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04X}", self.letter, self.code)
    }
}
