//! Vref codec and rank-wide Vref updates.
//!
//! CA Vref (MR12 OP[6:0]) and DQ Vref (MR14/MR15 OP[6:0]) share one encoding:
//! 15 % .. 73.5 % of VDDQ (500 mV) in 0.5 % steps, i.e. 2.5 mV per code.
//!
//! ```text
//! code:    0        58        70       117
//! Vref:  75 mV    220 mV    250 mV   367.5 mV
//! offset: -145 mV    0      +30 mV   +147.5 mV
//! ```
//!
//! Offsets are signed microvolts from the centre code 58.

use crate::context::{rank_bit, MrcContext, MAX_RANK};
use crate::error::{MrcError, Result};
use crate::hal::{MrcHardware, RankScope, RegisterId};
use crate::mode_register::{MR12, MR14, MR15, VREF_CODE_MASK};
use crate::odt::DramWidth;

/// Highest valid Vref code.
pub const VREF_MAX_CODE: u8 = 117;

/// Code whose offset is zero.
pub const VREF_CENTER_CODE: u8 = 58;

/// Voltage step per code.
pub const VREF_STEP_UV: i32 = 2_500;

/// Absolute Vref at code 0.
pub const VREF_MIN_UV: i32 = 75_000;

/// Lowest representable offset (code 0).
pub const VREF_MIN_OFFSET_UV: i32 = -145_000;

/// Highest representable offset (code 117).
pub const VREF_MAX_OFFSET_UV: i32 = 147_500;

/// Decoded Vref: register code and offset from centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VrefSetting {
    /// MR OP[6:0] code.
    pub encoded: u8,
    /// Signed offset from the centre code in µV.
    pub offset_microvolts: i32,
}

impl VrefSetting {
    /// Build from a register code.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidEncoding`] for codes above [`VREF_MAX_CODE`].
    pub fn from_code(encoded: u8) -> Result<Self> {
        Ok(Self { encoded, offset_microvolts: decode_vref(encoded)? })
    }

    /// Absolute Vref in µV.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // bounded by VREF_MAX_CODE
    pub const fn absolute_microvolts(self) -> i32 {
        VREF_MIN_UV + self.encoded as i32 * VREF_STEP_UV
    }
}

/// Decode a Vref register code to its offset in µV.
///
/// # Errors
///
/// [`MrcError::InvalidEncoding`] for codes above [`VREF_MAX_CODE`].
pub fn decode_vref(encoded: u8) -> Result<i32> {
    if encoded > VREF_MAX_CODE {
        return Err(MrcError::InvalidEncoding);
    }
    // code ≤ 117, so the product stays well inside i32.
    #[allow(clippy::arithmetic_side_effects)]
    let offset = (i32::from(encoded) - i32::from(VREF_CENTER_CODE)) * VREF_STEP_UV;
    Ok(offset)
}

/// Encode an offset in µV to a Vref register code.
///
/// # Errors
///
/// - [`MrcError::InvalidEncoding`] outside
///   [`VREF_MIN_OFFSET_UV`]..=[`VREF_MAX_OFFSET_UV`].
/// - [`MrcError::ValueNotSupported`] if the offset is not a multiple of
///   [`VREF_STEP_UV`].
pub fn encode_vref(offset_microvolts: i32) -> Result<u8> {
    if !(VREF_MIN_OFFSET_UV..=VREF_MAX_OFFSET_UV).contains(&offset_microvolts) {
        return Err(MrcError::InvalidEncoding);
    }
    if offset_microvolts.rem_euclid(VREF_STEP_UV) != 0 {
        return Err(MrcError::ValueNotSupported);
    }
    // Range-checked above: quotient is in -58..=59.
    #[allow(clippy::arithmetic_side_effects)]
    let code = offset_microvolts / VREF_STEP_UV + i32::from(VREF_CENTER_CODE);
    u8::try_from(code).map_err(|_| MrcError::InvalidEncoding)
}

/// Vref being adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VrefKind {
    /// CA bus Vref (MR12).
    Command,
    /// DQ write Vref (MR14, and MR15 on x16 parts).
    Write,
}

impl VrefKind {
    /// Short name for log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Command => "CA",
            Self::Write => "DQ",
        }
    }
}

/// Margin parameters a training step may hand to the Vref path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MarginParam {
    /// CA Vref.
    CmdV,
    /// DQ write Vref.
    WrV,
    /// DQ read Vref (SoC side, not a DRAM MR).
    RdV,
    /// Write timing.
    WrT,
    /// Read timing.
    RdT,
    /// Command timing.
    CmdT,
}

impl TryFrom<MarginParam> for VrefKind {
    type Error = MrcError;

    fn try_from(param: MarginParam) -> Result<Self> {
        match param {
            MarginParam::CmdV => Ok(Self::Command),
            MarginParam::WrV => Ok(Self::Write),
            _ => Err(MrcError::UnsupportedParameter),
        }
    }
}

/// Update CA or DQ Vref on every selected, present rank of a channel.
///
/// With `is_relative` the offset is added to each rank's cached Vref;
/// otherwise it is the new absolute offset. The cache is updated only when
/// `persist` is set, so a margin sweep can step Vref without disturbing the
/// trained value.
///
/// On x16 parts a write Vref update also programs MR15 (upper byte); a
/// relative step is applied to MR14 and MR15 separately.
///
/// Every rank is validated before the first write: an unencodable result
/// on any rank leaves the hardware and cache untouched. A failed write
/// leaves the cache untouched too.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] if `controller`/`channel` is outside the
///   topology.
/// - [`MrcError::InvalidEncoding`] / [`MrcError::ValueNotSupported`] if a
///   resulting offset cannot be encoded.
/// - [`MrcError::HardwareAccess`] if a mode-register write fails.
#[allow(clippy::too_many_arguments)]
pub fn apply_vref_offset<H: MrcHardware>(
    ctx: &mut MrcContext<H>,
    controller: u8,
    channel: u8,
    rank_mask: u8,
    kind: VrefKind,
    offset_microvolts: i32,
    persist: bool,
    is_relative: bool,
) -> Result<()> {
    let present = ctx.topology().rank_mask(controller, channel)?;
    let targets = present & rank_mask;

    let mut registers: heapless::Vec<u8, 2> = heapless::Vec::new();
    let _ = registers.push(match kind {
        VrefKind::Command => MR12,
        VrefKind::Write => MR14,
    });
    if kind == VrefKind::Write && ctx.config().dram_width == DramWidth::X16 {
        let _ = registers.push(MR15);
    }

    // Full register values per (rank, register). MR14 and MR15 carry
    // independent codes, so a relative step starts from each one's own cache.
    let mut planned = [[None::<u16>; 2]; MAX_RANK];
    for (rank, row) in (0u8..).zip(planned.iter_mut()) {
        if targets & rank_bit(rank) == 0 {
            continue;
        }
        for (&mr, slot) in registers.iter().zip(row.iter_mut()) {
            let cached = ctx.cached_mr(controller, channel, rank, mr)?;
            let target = if is_relative {
                let current = decode_vref(mr_vref_code(cached))?;
                current.checked_add(offset_microvolts).ok_or(MrcError::InvalidEncoding)?
            } else {
                offset_microvolts
            };
            match encode_vref(target) {
                Ok(code) => *slot = Some((cached & !VREF_CODE_MASK) | u16::from(code)),
                Err(e) => {
                    warn!(
                        "Vref {} rank {} MR{}: offset {} uV not encodable",
                        kind.name(),
                        rank,
                        mr,
                        target
                    );
                    return Err(e);
                }
            }
        }
    }

    for (rank, row) in (0u8..).zip(planned) {
        for (&mr, value) in registers.iter().zip(row) {
            let Some(value) = value else { continue };
            let scope = RankScope::Rank { controller, channel, rank };
            ctx.hw_mut()
                .write_register(scope, RegisterId::ModeRegister(mr), u32::from(value))
                .map_err(|_| MrcError::HardwareAccess)?;
            trace!("MR{} <- {} (rank {})", mr, value, rank);
        }
    }

    // Cache only once the whole update reached the DRAM.
    if persist {
        for (rank, row) in (0u8..).zip(planned) {
            for (&mr, value) in registers.iter().zip(row) {
                if let Some(value) = value {
                    ctx.set_cached_mr(controller, channel, rank, mr, value)?;
                }
            }
        }
    }
    debug!(
        "Vref {} mc{} ch{} ranks {}: offset {} uV",
        kind.name(),
        controller,
        channel,
        targets,
        offset_microvolts
    );
    Ok(())
}

#[allow(clippy::cast_possible_truncation)] // masked to 7 bits
fn mr_vref_code(mr_value: u16) -> u8 {
    (mr_value & VREF_CODE_MASK) as u8
}
