//! SAGV (system agent geyserville) frequency-switch MR sequence.
//!
//! On a SAGV point change the memory controller replays an MR sequence
//! from its own sequencer while traffic is blocked. The sequence programs
//! the inactive FSP with the new point's values and then flips FSP-OP:
//!
//! ```text
//! MR16  FSP-WR → inactive FSP, VRCG high current      tVRCG_ENABLE
//! MR1 MR2 MR3 MR10                                     tMRW
//! MR11                                                 tODTUP
//! MR12                                                 tVREFCA_LONG
//! MR14 [MR15 on x16] MR17 MR18 MR19 MR20 MR22 MR41     tMRW
//! MR16  FSP-OP → inactive FSP, VRCG normal            tFC_LONG
//! ```
//!
//! MR12/MR14/MR15 differ per rank: the sequence carries the first populated
//! rank's value and reports them in [`SagvSequenceInfo::per_rank`] so the
//! controller substitutes each rank's own value.

use crate::context::MrcContext;
use crate::error::{MrcError, Result};
use crate::hal::MrcHardware;
use crate::mode_register::{
    build_mr1, build_mr16, build_mr2, extract_field, insert_field, Fsp, ModeRegisterValue, Mr16Fields,
    MrSet, Vrcg, MR1, MR10, MR11, MR12, MR14, MR15, MR16, MR17, MR18, MR19, MR2, MR20, MR22, MR3,
    MR41,
};
use crate::odt::DramWidth;
use crate::sequence::{MrSequence, MrSequenceEntry, MAX_SEQUENCE_LEN};
use crate::timing::GmfDelay;

/// MRs replayed between the two MR16 writes, in order.
const SAGV_BODY: [u8; 14] = [MR1, MR2, MR3, MR10, MR11, MR12, MR14, MR15, MR17, MR18, MR19, MR20, MR22, MR41];

/// Result of [`build_sagv_sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagvSequenceInfo {
    /// Entries written to the output buffer.
    pub len: usize,
    /// MRs whose value must be taken per rank.
    pub per_rank: MrSet,
}

fn per_rank_set(width: DramWidth) -> MrSet {
    match width {
        DramWidth::X16 => MrSet::from_slice(&[MR12, MR14, MR15]),
        DramWidth::X8 => MrSet::from_slice(&[MR12, MR14]),
    }
}

const fn body_delay(mr: u8) -> GmfDelay {
    match mr {
        MR11 => GmfDelay::CaOdtUpdate,
        MR12 => GmfDelay::VrefCaLong,
        _ => GmfDelay::Mrw,
    }
}

/// Build the SAGV sequence for the context's target frequency.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] if no rank is populated.
/// - [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn sagv_sequence<H: MrcHardware>(ctx: &MrcContext<H>) -> Result<MrSequence> {
    let (controller, channel, rank) = ctx
        .topology()
        .populated_ranks()
        .next()
        .ok_or(MrcError::InvalidArgument)?;
    let width = ctx.config().dram_width;
    let frequency = ctx.frequency();
    let cached = |mr| ctx.cached_mr(controller, channel, rank, mr);

    let mr16 = cached(MR16)?;
    let target = if extract_field(mr16, 2, 2) == Fsp::Fsp1 as u16 { Fsp::Fsp0 } else { Fsp::Fsp1 };

    let mut seq = MrSequence::new();
    let mut push =
        |entry| seq.push(entry).map_err(|_| MrcError::BufferTooSmall { required: MAX_SEQUENCE_LEN });

    let enter = build_mr16(
        mr16,
        Mr16Fields { fsp_write: Some(target), vrcg: Some(Vrcg::HighCurrent), ..Mr16Fields::default() },
    );
    push(MrSequenceEntry::new(enter, GmfDelay::VrcgEnable))?;

    let org = ctx.bank_org()?;
    for mr in SAGV_BODY {
        if mr == MR15 && width == DramWidth::X8 {
            continue;
        }
        let value = match mr {
            MR1 => build_mr1(frequency)?.value,
            MR2 => build_mr2(frequency)?.value,
            MR3 => insert_field(cached(MR3)?, 3, 2, u16::from(org.mr3_code())),
            _ => cached(mr)?,
        };
        push(MrSequenceEntry::new(ModeRegisterValue::new(mr, value), body_delay(mr)))?;
    }

    let exit = build_mr16(
        enter.value,
        Mr16Fields { fsp_op: Some(target), vrcg: Some(Vrcg::Normal), ..Mr16Fields::default() },
    );
    push(MrSequenceEntry::new(exit, GmfDelay::FcLong))?;

    Ok(seq)
}

/// Number of entries [`build_sagv_sequence`] needs for this context.
///
/// # Errors
///
/// As [`sagv_sequence`].
pub fn sagv_required_len<H: MrcHardware>(ctx: &MrcContext<H>) -> Result<usize> {
    Ok(sagv_sequence(ctx)?.len())
}

/// Write the SAGV sequence into `out`.
///
/// # Errors
///
/// - [`MrcError::BufferTooSmall`] with the exact required length if `out`
///   is too short; `out` is left untouched.
/// - [`MrcError::InvalidArgument`] if no rank is populated.
pub fn build_sagv_sequence<H: MrcHardware>(
    ctx: &MrcContext<H>,
    out: &mut [MrSequenceEntry],
) -> Result<SagvSequenceInfo> {
    let seq = sagv_sequence(ctx)?;
    let len = seq.len();
    let Some(dst) = out.get_mut(..len) else {
        debug!("SAGV: buffer of {} entries, {} required", out.len(), len);
        return Err(MrcError::BufferTooSmall { required: len });
    };
    dst.copy_from_slice(&seq);
    debug!("SAGV sequence: {} entries at {} MT/s", len, ctx.frequency().mtps());
    Ok(SagvSequenceInfo { len, per_rank: per_rank_set(ctx.config().dram_width) })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MrcConfig;
    use crate::context::Topology;
    use crate::mock::MockHardware;
    use crate::timing::Frequency;

    fn ctx(width: DramWidth) -> MrcContext<MockHardware> {
        let config = MrcConfig::default().with_dram_width(width);
        let mut c = MrcContext::new(MockHardware::new(), config, Topology::single_rank(), Frequency::F6400).unwrap();
        c.load_default_mrs().unwrap();
        c
    }

    #[test]
    fn x16_sequence_layout() {
        let c = ctx(DramWidth::X16);
        let seq = sagv_sequence(&c).unwrap();
        assert_eq!(seq.len(), 16);
        let first = seq.first().unwrap();
        assert_eq!(first.mr.index, MR16);
        assert_eq!(first.delay, GmfDelay::VrcgEnable);
        let last = seq.last().unwrap();
        assert_eq!(last.mr.index, MR16);
        assert_eq!(last.delay, GmfDelay::FcLong);
        assert!(seq.iter().any(|e| e.mr.index == MR15));
    }

    #[test]
    fn x8_sequence_has_no_mr15() {
        let c = ctx(DramWidth::X8);
        let seq = sagv_sequence(&c).unwrap();
        assert_eq!(seq.len(), 15);
        assert!(seq.iter().all(|e| e.mr.index != MR15));
        let mut out = [MrSequenceEntry::new(ModeRegisterValue::new(0, 0), GmfDelay::None); 15];
        let info = build_sagv_sequence(&c, &mut out).unwrap();
        assert_eq!(info.per_rank, MrSet::from_slice(&[MR12, MR14]));
    }

    #[test]
    fn fsp_flips_to_inactive_setpoint() {
        let c = ctx(DramWidth::X16);
        let seq = sagv_sequence(&c).unwrap();
        // cold cache: FSP-OP0 active, so target FSP1
        assert_eq!(seq.first().unwrap().mr.value, 0b0100_0001);
        assert_eq!(seq.last().unwrap().mr.value, 0b0000_0101);

        let mut c = ctx(DramWidth::X16);
        c.set_cached_mr(0, 0, 0, MR16, 0b0000_0101).unwrap();
        let seq = sagv_sequence(&c).unwrap();
        assert_eq!(seq.first().unwrap().mr.value, 0b0100_0100);
        assert_eq!(seq.last().unwrap().mr.value, 0b0000_0000);
    }

    #[test]
    fn short_buffer_reports_exact_length() {
        let c = ctx(DramWidth::X16);
        let blank = MrSequenceEntry::new(ModeRegisterValue::new(0, 0), GmfDelay::None);
        let mut short = [blank; 4];
        assert_eq!(build_sagv_sequence(&c, &mut short), Err(MrcError::BufferTooSmall { required: 16 }));
        assert!(short.iter().all(|e| *e == blank));
    }

    #[test]
    fn empty_topology_rejected() {
        let c = MrcContext::new(MockHardware::new(), MrcConfig::default(), Topology::new(), Frequency::F6400).unwrap();
        assert_eq!(sagv_required_len(&c), Err(MrcError::InvalidArgument));
    }
}
