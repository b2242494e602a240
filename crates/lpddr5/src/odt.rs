//! On-die termination tables.
//!
//! LPDDR5 ODT values are programmed as fractions of RZQ (240 Ω):
//!
//! | Code | Value  |
//! |------|--------|
//! | 0    | off    |
//! | 1    | RZQ/1 = 240 Ω |
//! | 2    | RZQ/2 = 120 Ω |
//! | 3    | RZQ/3 = 80 Ω  |
//! | 4    | RZQ/4 = 60 Ω  |
//! | 5    | RZQ/5 = 48 Ω  |
//! | 6    | RZQ/6 = 40 Ω  |
//!
//! Board ODT tables are static and selected by board type, DRAM width and
//! ranks per channel. Their literal contents are board data; this module
//! owns the selection rules.

use crate::context::MrcContext;
use crate::hal::MrcHardware;

/// Sentinel for "termination disabled" in Ohm-valued fields.
pub const ODT_OFF: u16 = 0;

/// Number of ODT encodings in LPDDR5 mode registers.
pub const LP5_RZQ_NUM_VALUES: usize = 7;

/// Ohm value of each ODT code, indexed by code.
pub const LP5_RZQ_VALUES: [u16; LP5_RZQ_NUM_VALUES] = [ODT_OFF, 240, 120, 80, 60, 48, 40];

/// SoC ODT codes usable with the PU-Cal (VOH) setting, indexed by MR17 code.
///
/// Code 0 (off) leaves the SoC receiver unterminated and is not a valid
/// calibration target.
const PUCAL_SOC_ODT_VALID: [bool; 8] = [false, true, true, true, true, true, true, false];

/// RZQ code for an Ohm value; `None` if the value has no encoding.
#[must_use]
pub fn rzq_code(ohms: u16) -> Option<u8> {
    LP5_RZQ_VALUES
        .iter()
        .position(|&v| v == ohms)
        .and_then(|code| u8::try_from(code).ok())
}

/// Ohm value of an RZQ code; `None` for reserved codes.
#[must_use]
pub fn rzq_ohms(code: u8) -> Option<u16> {
    LP5_RZQ_VALUES.get(usize::from(code)).copied()
}

/// `true` if SoC ODT `code` (MR17 OP[2:0]) is valid with PU-Cal.
#[must_use]
pub fn pucal_soc_odt_valid(code: u8) -> bool {
    PUCAL_SOC_ODT_VALID
        .get(usize::from(code))
        .copied()
        .unwrap_or(false)
}

/// Platform class, each with its own ODT table set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoardType {
    /// Handheld / laptop, x16 and x8 packages.
    #[default]
    Mobile,
    /// Embedded boards, x16 packages only.
    Embedded,
    /// Validation reference board.
    Reference,
}

/// DRAM device width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DramWidth {
    /// Byte-mode device: one byte lane, MR14 only.
    X8,
    /// Two byte lanes: MR14 lower byte, MR15 upper byte.
    #[default]
    X16,
}

/// Ranks-per-channel selector into a board's ODT table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OdtIndex {
    /// One package per channel, one rank.
    OneDpcOneRank,
    /// One package per channel, two ranks.
    OneDpcTwoRanks,
}

impl OdtIndex {
    /// Selector for a channel with `ranks` populated ranks.
    #[must_use]
    pub const fn for_rank_count(ranks: u32) -> Option<Self> {
        match ranks {
            1 => Some(Self::OneDpcOneRank),
            2 => Some(Self::OneDpcTwoRanks),
            _ => None,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::OneDpcOneRank => 0,
            Self::OneDpcTwoRanks => 1,
        }
    }
}

/// Termination values for one board/width/rank configuration, in Ohms.
///
/// [`ODT_OFF`] marks a disabled termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OdtValues {
    /// DRAM DQ write termination (MR11 OP[2:0]).
    pub dq_odt: u16,
    /// DRAM CA termination (MR11 OP[6:4]).
    pub ca_odt: u16,
    /// DRAM non-target DQ termination (MR41 OP[7:5]).
    pub nt_odt: u16,
    /// SoC-side read termination (MR17 OP[2:0]).
    pub soc_odt: u16,
    /// WCK termination (MR18 OP[2:0]).
    pub wck_odt: u16,
}

impl OdtValues {
    /// Terminations used when a board has no table entry.
    pub const JEDEC_DEFAULT: Self = Self {
        dq_odt: ODT_OFF,
        ca_odt: ODT_OFF,
        nt_odt: 80,
        soc_odt: 60,
        wck_odt: ODT_OFF,
    };
}

type OdtTable = [OdtValues; 2];

const MOBILE_X16: OdtTable = [
    OdtValues { dq_odt: 48, ca_odt: 80, nt_odt: ODT_OFF, soc_odt: 60, wck_odt: 48 },
    OdtValues { dq_odt: 60, ca_odt: 120, nt_odt: 80, soc_odt: 60, wck_odt: 60 },
];

const MOBILE_X8: OdtTable = [
    OdtValues { dq_odt: 60, ca_odt: 120, nt_odt: ODT_OFF, soc_odt: 80, wck_odt: 60 },
    OdtValues { dq_odt: 80, ca_odt: 120, nt_odt: 120, soc_odt: 80, wck_odt: 80 },
];

const EMBEDDED_X16: OdtTable = [
    OdtValues { dq_odt: 40, ca_odt: 60, nt_odt: ODT_OFF, soc_odt: 48, wck_odt: 40 },
    OdtValues { dq_odt: 48, ca_odt: 80, nt_odt: 60, soc_odt: 48, wck_odt: 48 },
];

const REFERENCE_X16: OdtTable = [
    OdtValues { dq_odt: 40, ca_odt: 40, nt_odt: ODT_OFF, soc_odt: 40, wck_odt: 40 },
    OdtValues { dq_odt: 48, ca_odt: 60, nt_odt: 48, soc_odt: 40, wck_odt: 48 },
];

const REFERENCE_X8: OdtTable = [
    OdtValues { dq_odt: 48, ca_odt: 60, nt_odt: ODT_OFF, soc_odt: 48, wck_odt: 48 },
    OdtValues { dq_odt: 60, ca_odt: 80, nt_odt: 60, soc_odt: 48, wck_odt: 60 },
];

fn board_table(board: BoardType, width: DramWidth) -> Option<&'static OdtTable> {
    match (board, width) {
        (BoardType::Mobile, DramWidth::X16) => Some(&MOBILE_X16),
        (BoardType::Mobile, DramWidth::X8) => Some(&MOBILE_X8),
        (BoardType::Embedded, DramWidth::X16) => Some(&EMBEDDED_X16),
        (BoardType::Embedded, DramWidth::X8) => None,
        (BoardType::Reference, DramWidth::X16) => Some(&REFERENCE_X16),
        (BoardType::Reference, DramWidth::X8) => Some(&REFERENCE_X8),
    }
}

/// Select the ODT table entry for `dimm` on the context's board.
///
/// LPDDR5 has one package per channel, so `dimm` must be 0. Returns `None`
/// when the board/width combination has no table.
pub fn select_odt_table<H: MrcHardware>(
    ctx: &MrcContext<H>,
    dimm: u8,
    odt_index: OdtIndex,
) -> Option<&'static OdtValues> {
    if dimm != 0 {
        warn!("ODT table: dimm {} does not exist on LPDDR5", dimm);
        return None;
    }
    let config = ctx.config();
    let table = board_table(config.board, config.dram_width)?;
    table.get(odt_index.slot())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MrcConfig;
    use crate::context::Topology;
    use crate::mock::MockHardware;
    use crate::timing::Frequency;

    fn ctx(board: BoardType, width: DramWidth) -> MrcContext<MockHardware> {
        let config = MrcConfig::default().with_board(board).with_dram_width(width);
        MrcContext::new(MockHardware::new(), config, Topology::single_rank(), Frequency::F6400)
            .unwrap()
    }

    #[test]
    fn rzq_table_round_trip() {
        for (code, &ohms) in LP5_RZQ_VALUES.iter().enumerate() {
            assert_eq!(usize::from(rzq_code(ohms).unwrap()), code);
            assert_eq!(rzq_ohms(u8::try_from(code).unwrap()), Some(ohms));
        }
        assert_eq!(rzq_code(50), None);
        assert_eq!(rzq_ohms(7), None);
    }

    #[test]
    fn pucal_rejects_off_and_reserved() {
        assert!(!pucal_soc_odt_valid(0));
        assert!(pucal_soc_odt_valid(4));
        assert!(!pucal_soc_odt_valid(7));
        assert!(!pucal_soc_odt_valid(200));
    }

    #[test]
    fn mobile_x16_two_rank_entry() {
        let c = ctx(BoardType::Mobile, DramWidth::X16);
        let odt = select_odt_table(&c, 0, OdtIndex::OneDpcTwoRanks).unwrap();
        assert_eq!(odt.nt_odt, 80);
        // Two-rank entry terminates the idle rank, single-rank does not.
        let single = select_odt_table(&c, 0, OdtIndex::OneDpcOneRank).unwrap();
        assert_eq!(single.nt_odt, ODT_OFF);
    }

    #[test]
    fn embedded_x8_has_no_table() {
        let c = ctx(BoardType::Embedded, DramWidth::X8);
        assert!(select_odt_table(&c, 0, OdtIndex::OneDpcOneRank).is_none());
    }

    #[test]
    fn second_dimm_is_rejected() {
        let c = ctx(BoardType::Mobile, DramWidth::X16);
        assert!(select_odt_table(&c, 1, OdtIndex::OneDpcOneRank).is_none());
    }

    #[test]
    fn every_table_value_is_encodable() {
        for table in [MOBILE_X16, MOBILE_X8, EMBEDDED_X16, REFERENCE_X16, REFERENCE_X8] {
            for v in table {
                for ohms in [v.dq_odt, v.ca_odt, v.nt_odt, v.soc_odt, v.wck_odt] {
                    assert!(rzq_code(ohms).is_some(), "{ohms} Ω has no RZQ code");
                }
            }
        }
    }
}
