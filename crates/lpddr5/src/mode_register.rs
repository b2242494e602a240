//! LPDDR5 mode-register layouts, builders and the per-rank MR cache.
//!
//! Field positions follow JESD209-5B section 7.4. Every builder returns a
//! [`ModeRegisterValue`]; nothing here touches hardware.
//!
//! # Registers programmed by the engine
//!
//! ```text
//! MR1   OP[7:4] WL code
//! MR2   OP[7:4] nWR code          OP[3:0] RL code
//! MR3   OP[7] DBI-WR  OP[6] DBI-RD  OP[5] WLS  OP[4:3] bank org  OP[2:0] PDDS
//! MR10  OP[7:6] RDQS_PST  OP[5:4] RDQS_PRE  OP[3:2] WCK_PST  OP[0] RPST mode
//! MR11  OP[6:4] CA ODT    OP[3] NT-ODT enable   OP[2:0] DQ ODT
//! MR12  OP[7] VBS         OP[6:0] CA Vref
//! MR13  OP[6] CBT mode    OP[5] DMD
//! MR14  OP[7] VDLC        OP[6:0] DQ Vref (lower byte)
//! MR15                    OP[6:0] DQ Vref (upper byte)
//! MR16  OP[7] CBT phase  OP[6] VRCG  OP[5:4] CBT  OP[3:2] FSP-OP  OP[1:0] FSP-WR
//! MR17  OP[2:0] SoC ODT
//! MR18  OP[7] CKR (0 = 4:1)   OP[2:0] WCK ODT
//! MR19  DVFS  MR20  RDQS/WCK mode  MR22  link ECC
//! MR25  PPR resources (read only, one bit per bank)
//! MR28  ZQ control
//! MR37  WCK2DQI oscillator run time
//! MR41  OP[7:5] NT DQ ODT     OP[4] PPRE
//! ```

use crate::bank::BankOrg;
use crate::error::{MrcError, Result};
use crate::odt::{rzq_code, OdtValues, ODT_OFF};
use crate::timing::{latency_code, Frequency};

// ─── MR numbers ──────────────────────────────────────────────────────────────

/// Write latency.
pub const MR1: u8 = 1;
/// Read latency and nWR.
pub const MR2: u8 = 2;
/// DBI, bank organisation, pull-down drive strength.
pub const MR3: u8 = 3;
/// Read/write preamble and postamble.
pub const MR10: u8 = 10;
/// DQ, CA and NT ODT.
pub const MR11: u8 = 11;
/// CA Vref.
pub const MR12: u8 = 12;
/// CBT mode, data mask.
pub const MR13: u8 = 13;
/// DQ Vref, lower byte.
pub const MR14: u8 = 14;
/// DQ Vref, upper byte.
pub const MR15: u8 = 15;
/// Frequency set points, VRCG, CBT.
pub const MR16: u8 = 16;
/// SoC ODT.
pub const MR17: u8 = 17;
/// WCK ODT and WCK:CK ratio.
pub const MR18: u8 = 18;
/// DVFS.
pub const MR19: u8 = 19;
/// RDQS / WCK mode.
pub const MR20: u8 = 20;
/// Link ECC.
pub const MR22: u8 = 22;
/// PPR resources.
pub const MR25: u8 = 25;
/// ZQ control.
pub const MR28: u8 = 28;
/// WCK2DQI interval timer run time.
pub const MR37: u8 = 37;
/// NT DQ ODT, PPR entry.
pub const MR41: u8 = 41;

/// Mode registers held in the per-rank cache, in programming order.
///
/// The cache slot of an MR is its position in this list.
pub const MR_INIT_LIST: [u8; MR_COUNT] = [
    MR1, MR2, MR3, MR10, MR11, MR12, MR13, MR14, MR15, MR16, MR17, MR18, MR19, MR20, MR22, MR28,
    MR37, MR41,
];

/// Number of cached mode registers per rank.
pub const MR_COUNT: usize = 18;

/// Cache slot of mode register `mr`, if it is cached.
#[must_use]
pub fn mr_slot(mr: u8) -> Option<usize> {
    MR_INIT_LIST.iter().position(|&m| m == mr)
}

// ─── Field helpers ───────────────────────────────────────────────────────────

/// OP[6:0] Vref code in MR12/MR14/MR15.
pub const VREF_CODE_MASK: u16 = 0x7F;

/// Default CA and DQ Vref code (50 % VDDQ).
pub const VREF_DEFAULT_CODE: u8 = 70;

/// Encoded NT DQ ODT written to MR41 when the board table has none (RZQ/3).
pub const LP5_DEFAULT_NT_DQ_ODT: u8 = 3;

/// MR10 default: WCK postamble 2.5 tWCK, static RDQS pre/postamble.
pub const MR10_DEFAULT: u16 = 0b0000_0100;

/// MR28 default: ZQ background calibration interval code 01.
pub const MR28_DEFAULT: u16 = 0b0000_0100;

/// Default PDDS code (RZQ/6, 40 Ω).
pub const PDDS_DEFAULT_CODE: u8 = 6;

/// Replace `width` bits at `shift` in `base` with `field`.
#[allow(clippy::arithmetic_side_effects)] // shift + width ≤ 16 at every call site
pub(crate) const fn insert_field(base: u16, shift: u32, width: u32, field: u16) -> u16 {
    let mask = ((1u16 << width) - 1) << shift;
    (base & !mask) | ((field << shift) & mask)
}

/// Read `width` bits at `shift` from `value`.
#[allow(clippy::arithmetic_side_effects)]
pub(crate) const fn extract_field(value: u16, shift: u32, width: u32) -> u16 {
    (value >> shift) & ((1u16 << width) - 1)
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// One mode-register write: MR number and 8-bit payload (widened to 16 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeRegisterValue {
    /// MR number.
    pub index: u8,
    /// OP[7:0] payload.
    pub value: u16,
}

impl ModeRegisterValue {
    /// Pair an MR number with a payload.
    #[must_use]
    pub const fn new(index: u8, value: u16) -> Self {
        Self { index, value }
    }
}

/// Set of MR numbers, iterated in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MrSet(u128);

impl MrSet {
    /// Empty set.
    pub const EMPTY: Self = Self(0);

    /// Set containing `mrs`; MR numbers ≥ 128 are ignored.
    #[must_use]
    pub fn from_slice(mrs: &[u8]) -> Self {
        mrs.iter().fold(Self::EMPTY, |set, &mr| set.with(mr))
    }

    /// Copy of the set with `mr` added.
    #[must_use]
    pub fn with(self, mr: u8) -> Self {
        Self(self.0 | bit(mr))
    }

    /// Add `mr` in place.
    pub fn insert(&mut self, mr: u8) {
        self.0 |= bit(mr);
    }

    /// `true` if `mr` is a member.
    #[must_use]
    pub fn contains(self, mr: u8) -> bool {
        self.0 & bit(mr) != 0
    }

    /// Number of members.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// `true` if there are no members.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0u8..128).filter(move |&mr| self.contains(mr))
    }
}

fn bit(mr: u8) -> u128 {
    1u128.checked_shl(u32::from(mr)).unwrap_or(0)
}

// ─── Per-rank cache ──────────────────────────────────────────────────────────

/// Last programmed (or default) payload of every cached MR of one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MrCache([u16; MR_COUNT]);

impl Default for MrCache {
    fn default() -> Self {
        Self([0; MR_COUNT])
    }
}

impl MrCache {
    /// Cached payload of `mr`; `None` if `mr` is not a cached register.
    #[must_use]
    pub fn get(&self, mr: u8) -> Option<u16> {
        mr_slot(mr).and_then(|slot| self.0.get(slot).copied())
    }

    /// Store the payload of `mr`.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] if `mr` is not a cached register.
    pub fn set(&mut self, mr: u8, value: u16) -> Result<()> {
        let slot = mr_slot(mr).and_then(|slot| self.0.get_mut(slot));
        match slot {
            Some(entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(MrcError::InvalidArgument),
        }
    }

    /// `(mr, value)` pairs in programming order.
    pub fn iter(&self) -> impl Iterator<Item = ModeRegisterValue> + '_ {
        MR_INIT_LIST
            .iter()
            .zip(self.0.iter())
            .map(|(&index, &value)| ModeRegisterValue::new(index, value))
    }
}

// ─── Latency / configuration registers ───────────────────────────────────────

/// MR1 with the write latency for `frequency`.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn build_mr1(frequency: Frequency) -> Result<ModeRegisterValue> {
    let code = u16::from(latency_code(frequency)?);
    Ok(ModeRegisterValue::new(MR1, insert_field(0, 4, 4, code)))
}

/// MR2 with the read latency and nWR for `frequency`.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn build_mr2(frequency: Frequency) -> Result<ModeRegisterValue> {
    let code = u16::from(latency_code(frequency)?);
    let value = insert_field(insert_field(0, 4, 4, code), 0, 4, code);
    Ok(ModeRegisterValue::new(MR2, value))
}

/// MR3 with bank organisation and pull-down drive strength; DBI off,
/// write latency set A.
#[must_use]
pub fn build_mr3(org: BankOrg, pdds_code: u8) -> ModeRegisterValue {
    let value = insert_field(0, 3, 2, u16::from(org.mr3_code()));
    ModeRegisterValue::new(MR3, insert_field(value, 0, 3, u16::from(pdds_code)))
}

/// MR11 from a board ODT entry.
///
/// # Errors
///
/// [`MrcError::ValueNotSupported`] if an ODT value has no RZQ code.
pub fn build_mr11(odt: &OdtValues) -> Result<ModeRegisterValue> {
    let dq = rzq_code(odt.dq_odt).ok_or(MrcError::ValueNotSupported)?;
    let ca = rzq_code(odt.ca_odt).ok_or(MrcError::ValueNotSupported)?;
    let nt_enable = u16::from(odt.nt_odt != ODT_OFF);
    let value = insert_field(0, 4, 3, u16::from(ca));
    let value = insert_field(value, 3, 1, nt_enable);
    Ok(ModeRegisterValue::new(MR11, insert_field(value, 0, 3, u16::from(dq))))
}

/// A Vref register (MR12, MR14 or MR15) carrying `code` in OP[6:0].
#[must_use]
pub fn build_vref_mr(index: u8, code: u8) -> ModeRegisterValue {
    ModeRegisterValue::new(index, u16::from(code) & VREF_CODE_MASK)
}

/// MR17 with the SoC ODT code.
///
/// # Errors
///
/// [`MrcError::ValueNotSupported`] if `soc_odt` has no RZQ code.
pub fn build_mr17(soc_odt: u16) -> Result<ModeRegisterValue> {
    let code = rzq_code(soc_odt).ok_or(MrcError::ValueNotSupported)?;
    Ok(ModeRegisterValue::new(MR17, insert_field(0, 0, 3, u16::from(code))))
}

/// MR18 with 4:1 WCK:CK and the WCK ODT code.
///
/// # Errors
///
/// [`MrcError::ValueNotSupported`] if `wck_odt` has no RZQ code.
pub fn build_mr18(wck_odt: u16) -> Result<ModeRegisterValue> {
    let code = rzq_code(wck_odt).ok_or(MrcError::ValueNotSupported)?;
    // CKR OP[7] = 0 selects 4:1.
    Ok(ModeRegisterValue::new(MR18, insert_field(0, 0, 3, u16::from(code))))
}

/// MR37 with the WCK2DQI oscillator run-time code.
#[must_use]
pub fn build_mr37(run_time: u8) -> ModeRegisterValue {
    ModeRegisterValue::new(MR37, u16::from(run_time))
}

/// MR41 with the NT DQ ODT code and PPR entry bit.
#[must_use]
pub fn build_mr41(base: u16, nt_odt_code: Option<u8>, ppre: Option<bool>) -> ModeRegisterValue {
    let mut value = base;
    if let Some(code) = nt_odt_code {
        value = insert_field(value, 5, 3, u16::from(code));
    }
    if let Some(ppre) = ppre {
        value = insert_field(value, 4, 1, u16::from(ppre));
    }
    ModeRegisterValue::new(MR41, value)
}

// ─── MR13 ────────────────────────────────────────────────────────────────────

/// MR13 OP[6]: command bus training mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CbtMode {
    /// CA pattern returned on DQ[6:0], Vref on DQ[13:7].
    Mode1 = 0,
    /// CA pattern returned on DQ[6:0] only.
    Mode2 = 1,
}

/// Optional MR13 fields; `None` keeps the base value's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mr13Fields {
    /// OP[6].
    pub cbt_mode: Option<CbtMode>,
    /// OP[5] data mask disable.
    pub data_mask_disable: Option<bool>,
}

/// Merge `fields` into an MR13 base value.
#[must_use]
pub fn build_mr13(base: u16, fields: Mr13Fields) -> ModeRegisterValue {
    let mut value = base;
    if let Some(mode) = fields.cbt_mode {
        value = insert_field(value, 6, 1, mode as u16);
    }
    if let Some(dmd) = fields.data_mask_disable {
        value = insert_field(value, 5, 1, u16::from(dmd));
    }
    ModeRegisterValue::new(MR13, value)
}

// ─── MR16 ────────────────────────────────────────────────────────────────────

/// Frequency set point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fsp {
    /// FSP0.
    Fsp0 = 0,
    /// FSP1.
    Fsp1 = 1,
    /// FSP2.
    Fsp2 = 2,
}

/// MR16 OP[6]: VREF current generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Vrcg {
    /// Normal operation.
    Normal = 0,
    /// High-current mode for fast Vref settling across FSP switches.
    HighCurrent = 1,
}

/// MR16 OP[5:4]: command bus training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cbt {
    /// Normal operation.
    Normal = 0,
    /// Training on the FSP selected by FSP-WR.
    Training = 1,
}

/// MR16 OP[7]: CBT sampling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CbtPhase {
    /// Rising CK edge.
    Rising = 0,
    /// Falling CK edge.
    Falling = 1,
}

/// Optional MR16 fields; `None` keeps the base value's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mr16Fields {
    /// OP[1:0].
    pub fsp_write: Option<Fsp>,
    /// OP[3:2].
    pub fsp_op: Option<Fsp>,
    /// OP[5:4].
    pub cbt: Option<Cbt>,
    /// OP[6].
    pub vrcg: Option<Vrcg>,
    /// OP[7].
    pub cbt_phase: Option<CbtPhase>,
}

/// Merge `fields` into an MR16 base value.
#[must_use]
pub fn build_mr16(base: u16, fields: Mr16Fields) -> ModeRegisterValue {
    let mut value = base;
    if let Some(fsp) = fields.fsp_write {
        value = insert_field(value, 0, 2, fsp as u16);
    }
    if let Some(fsp) = fields.fsp_op {
        value = insert_field(value, 2, 2, fsp as u16);
    }
    if let Some(cbt) = fields.cbt {
        value = insert_field(value, 4, 2, cbt as u16);
    }
    if let Some(vrcg) = fields.vrcg {
        value = insert_field(value, 6, 1, vrcg as u16);
    }
    if let Some(phase) = fields.cbt_phase {
        value = insert_field(value, 7, 1, phase as u16);
    }
    ModeRegisterValue::new(MR16, value)
}

// ─── Default image ───────────────────────────────────────────────────────────

/// Default MR image of one rank at `frequency`.
///
/// Latencies come from the frequency tables, terminations from `odt`,
/// both Vrefs start at [`VREF_DEFAULT_CODE`].
///
/// # Errors
///
/// - [`MrcError::UnsupportedFrequency`] outside the supported set.
/// - [`MrcError::ValueNotSupported`] if an ODT value has no RZQ code.
pub fn default_mr_image(frequency: Frequency, org: BankOrg, odt: &OdtValues) -> Result<MrCache> {
    let nt_code = if odt.nt_odt == ODT_OFF {
        LP5_DEFAULT_NT_DQ_ODT
    } else {
        rzq_code(odt.nt_odt).ok_or(MrcError::ValueNotSupported)?
    };
    let run_time = crate::dqio::dqio_duration(frequency).map_err(|_| MrcError::UnsupportedFrequency)?;

    let entries = [
        build_mr1(frequency)?,
        build_mr2(frequency)?,
        build_mr3(org, PDDS_DEFAULT_CODE),
        ModeRegisterValue::new(MR10, MR10_DEFAULT),
        build_mr11(odt)?,
        build_vref_mr(MR12, VREF_DEFAULT_CODE),
        ModeRegisterValue::new(MR13, 0),
        build_vref_mr(MR14, VREF_DEFAULT_CODE),
        build_vref_mr(MR15, VREF_DEFAULT_CODE),
        ModeRegisterValue::new(MR16, 0),
        build_mr17(odt.soc_odt)?,
        build_mr18(odt.wck_odt)?,
        ModeRegisterValue::new(MR19, 0),
        ModeRegisterValue::new(MR20, 0),
        ModeRegisterValue::new(MR22, 0),
        ModeRegisterValue::new(MR28, MR28_DEFAULT),
        build_mr37(run_time),
        build_mr41(0, Some(nt_code), Some(false)),
    ];

    let mut image = MrCache::default();
    for mr in entries {
        image.set(mr.index, mr.value)?;
    }
    Ok(image)
}
