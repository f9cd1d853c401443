//! Modem control line signals
//!
//! Raw line state travels as a bitmask. The same bit layout is used for the
//! raw state reported by the native layer, the applied mask, and both halves
//! of a [`LineEvent`].
//!
//! ```text
//! bit 0  CTS  clear to send
//! bit 1  DSR  data set ready
//! bit 2  DCD  data carrier detect
//! bit 3  RI   ring indicator
//! ```

use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not};
use core::str::FromStr;

/// Bitmask over the modem control lines.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct LineMask(u32);

impl LineMask {
    pub const NONE: LineMask = LineMask(0);
    pub const CTS: LineMask = LineMask(0x01);
    pub const DSR: LineMask = LineMask(0x02);
    pub const DCD: LineMask = LineMask(0x04);
    pub const RI: LineMask = LineMask(0x08);
    pub const ALL: LineMask = LineMask(0x0F);

    const NAMES: [(LineMask, &'static str); 4] = [
        (LineMask::CTS, "CTS"),
        (LineMask::DSR, "DSR"),
        (LineMask::DCD, "DCD"),
        (LineMask::RI, "RI"),
    ];

    /// Keep only the bits that name a known line.
    #[inline]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: LineMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`.
    #[inline]
    pub const fn intersects(self, other: LineMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LineMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LineMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LineMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for LineMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitXor for LineMask {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Not for LineMask {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for LineMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineMask({})", self)
    }
}

impl fmt::Display for LineMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let mut first = true;
        for (bit, name) in Self::NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Error returned when a mask string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLineMaskError(pub String);

impl fmt::Display for ParseLineMaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid line mask: {:?}", self.0)
    }
}

impl std::error::Error for ParseLineMaskError {}

/// Accepts `all`, `none`, a number (`3`, `0x0f`), or names joined with `|`
/// or `,` (`cts|dsr`). Case-insensitive.
impl FromStr for LineMask {
    type Err = ParseLineMaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "all" => return Ok(LineMask::ALL),
            "none" | "" => return Ok(LineMask::NONE),
            _ => {}
        }
        if let Some(hex) = lower.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16)
                .map(LineMask::from_bits_truncate)
                .map_err(|_| ParseLineMaskError(s.to_string()));
        }
        if let Ok(n) = lower.parse::<u32>() {
            return Ok(LineMask::from_bits_truncate(n));
        }

        let mut mask = LineMask::NONE;
        for part in lower.split(['|', ',']) {
            mask |= match part.trim() {
                "cts" => LineMask::CTS,
                "dsr" => LineMask::DSR,
                "dcd" | "cd" => LineMask::DCD,
                "ri" | "ring" => LineMask::RI,
                _ => return Err(ParseLineMaskError(s.to_string())),
            };
        }
        Ok(mask)
    }
}

/// Snapshot of the modem lines as reported by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineStatus {
    pub cts: bool,
    pub dsr: bool,
    pub dcd: bool,
    pub ri: bool,
}

impl LineStatus {
    /// Combine the individual line flags into one bitmask.
    pub fn mask(&self) -> LineMask {
        let mut m = LineMask::NONE;
        if self.cts {
            m |= LineMask::CTS;
        }
        if self.dsr {
            m |= LineMask::DSR;
        }
        if self.dcd {
            m |= LineMask::DCD;
        }
        if self.ri {
            m |= LineMask::RI;
        }
        m
    }

    pub fn from_mask(mask: LineMask) -> Self {
        Self {
            cts: mask.contains(LineMask::CTS),
            dsr: mask.contains(LineMask::DSR),
            dcd: mask.contains(LineMask::DCD),
            ri: mask.contains(LineMask::RI),
        }
    }
}

/// A change in filtered line state.
///
/// Both halves are already ANDed with the mask that was applied when the
/// event was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    previous: LineMask,
    current: LineMask,
}

impl LineEvent {
    pub const fn new(previous: LineMask, current: LineMask) -> Self {
        Self { previous, current }
    }

    #[inline]
    pub const fn previous(&self) -> LineMask {
        self.previous
    }

    #[inline]
    pub const fn current(&self) -> LineMask {
        self.current
    }

    /// Lines whose state differs between the two halves.
    #[inline]
    pub fn changed(&self) -> LineMask {
        self.previous ^ self.current
    }

    /// Lines that went from deasserted to asserted.
    #[inline]
    pub fn asserted(&self) -> LineMask {
        self.current & !self.previous
    }

    /// Lines that went from asserted to deasserted.
    #[inline]
    pub fn deasserted(&self) -> LineMask {
        self.previous & !self.current
    }

    pub fn cts(&self) -> bool {
        self.current.contains(LineMask::CTS)
    }

    pub fn dsr(&self) -> bool {
        self.current.contains(LineMask::DSR)
    }

    pub fn dcd(&self) -> bool {
        self.current.contains(LineMask::DCD)
    }

    pub fn ri(&self) -> bool {
        self.current.contains(LineMask::RI)
    }
}

impl fmt::Display for LineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.previous, self.current)
    }
}
