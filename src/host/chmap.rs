//! Host channel-map positions.
//!
//! Values follow the host's numbering so they can cross the FFI boundary
//! unchanged.

use std::fmt;

/// A channel position as the host PCM layer names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChmapPosition {
    /// Unspecified.
    Unknown = 0,
    /// Not available (silent).
    NA = 1,
    /// Mono.
    Mono = 2,
    /// Front left.
    FL = 3,
    /// Front right.
    FR = 4,
    /// Rear left.
    RL = 5,
    /// Rear right.
    RR = 6,
    /// Front center.
    FC = 7,
    /// Low frequency effects.
    LFE = 8,
    /// Side left.
    SL = 9,
    /// Side right.
    SR = 10,
    /// Rear center.
    RC = 11,
    /// Front left center.
    FLC = 12,
    /// Front right center.
    FRC = 13,
    /// Rear left center.
    RLC = 14,
    /// Rear right center.
    RRC = 15,
    /// Front left wide.
    FLW = 16,
    /// Front right wide.
    FRW = 17,
    /// Front left high.
    FLH = 18,
    /// Front center high.
    FCH = 19,
    /// Front right high.
    FRH = 20,
    /// Top center.
    TC = 21,
    /// Top front left.
    TFL = 22,
    /// Top front right.
    TFR = 23,
    /// Top front center.
    TFC = 24,
    /// Top rear left.
    TRL = 25,
    /// Top rear right.
    TRR = 26,
    /// Top rear center.
    TRC = 27,
    /// Top front left center.
    TFLC = 28,
    /// Top front right center.
    TFRC = 29,
    /// Top side left.
    TSL = 30,
    /// Top side right.
    TSR = 31,
    /// Left LFE.
    LLFE = 32,
    /// Right LFE.
    RLFE = 33,
    /// Bottom center.
    BC = 34,
    /// Bottom left center.
    BLC = 35,
    /// Bottom right center.
    BRC = 36,
}

impl ChmapPosition {
    const ALL: [ChmapPosition; 37] = [
        Self::Unknown,
        Self::NA,
        Self::Mono,
        Self::FL,
        Self::FR,
        Self::RL,
        Self::RR,
        Self::FC,
        Self::LFE,
        Self::SL,
        Self::SR,
        Self::RC,
        Self::FLC,
        Self::FRC,
        Self::RLC,
        Self::RRC,
        Self::FLW,
        Self::FRW,
        Self::FLH,
        Self::FCH,
        Self::FRH,
        Self::TC,
        Self::TFL,
        Self::TFR,
        Self::TFC,
        Self::TRL,
        Self::TRR,
        Self::TRC,
        Self::TFLC,
        Self::TFRC,
        Self::TSL,
        Self::TSR,
        Self::LLFE,
        Self::RLFE,
        Self::BC,
        Self::BLC,
        Self::BRC,
    ];

    /// Position from its raw host value. Flag bits (phase inverse,
    /// driver-specific) are ignored; unrecognized values map to `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        let position = raw & 0xffff;
        Self::ALL
            .get(position as usize)
            .copied()
            .unwrap_or(Self::Unknown)
    }

    /// Raw host value.
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ChmapPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a device applies an advertised channel map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChmapType {
    /// No remapping information.
    None,
    /// Positions are fixed by the hardware.
    Fixed,
    /// Any permutation of the positions may be requested.
    Var,
    /// Pairs of channels may be swapped.
    Paired,
}

impl ChmapType {
    /// Type from its raw host value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Fixed,
            2 => Self::Var,
            3 => Self::Paired,
            _ => Self::None,
        }
    }
}

/// One channel map a device advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChmapQuery {
    /// How the map may be applied.
    pub map_type: ChmapType,
    /// Positions in frame order.
    pub positions: Vec<ChmapPosition>,
}

impl ChmapQuery {
    /// A map whose channel order the caller may choose.
    pub fn var(positions: &[ChmapPosition]) -> Self {
        Self {
            map_type: ChmapType::Var,
            positions: positions.to_vec(),
        }
    }

    /// A map whose channel order is fixed by the hardware.
    pub fn fixed(positions: &[ChmapPosition]) -> Self {
        Self {
            map_type: ChmapType::Fixed,
            positions: positions.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        for position in ChmapPosition::ALL {
            assert_eq!(ChmapPosition::from_raw(position.as_raw()), position);
        }
    }

    #[test]
    fn test_raw_ignores_flags() {
        // phase-inverse flag
        assert_eq!(ChmapPosition::from_raw(0x10000 | 3), ChmapPosition::FL);
        assert_eq!(ChmapPosition::from_raw(200), ChmapPosition::Unknown);
    }

    #[test]
    fn test_type_from_raw() {
        assert_eq!(ChmapType::from_raw(2), ChmapType::Var);
        assert_eq!(ChmapType::from_raw(9), ChmapType::None);
    }
}
