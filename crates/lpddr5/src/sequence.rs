//! Ordered mode-register sequences and their execution.
//!
//! A sequence is a list of MR writes, each followed by a [`GmfDelay`]. The
//! delay is resolved to nCK at the data rate the DRAM is running when the
//! write is issued, then converted to wall-clock time for `DelayNs`.

use crate::context::MrcContext;
use crate::error::{MrcError, Result};
use crate::hal::{MrcHardware, RankScope, RegisterId};
use crate::mode_register::{ModeRegisterValue, MrSet};
use crate::timing::{gmf_delay_nck, time_from_nck, Frequency, GmfDelay};

/// Longest sequence the engine builds.
pub const MAX_SEQUENCE_LEN: usize = 32;

/// One MR write and the wait that must follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MrSequenceEntry {
    /// Register and payload.
    pub mr: ModeRegisterValue,
    /// Wait after the write.
    pub delay: GmfDelay,
}

impl MrSequenceEntry {
    /// Pair a write with its trailing delay.
    #[must_use]
    pub const fn new(mr: ModeRegisterValue, delay: GmfDelay) -> Self {
        Self { mr, delay }
    }
}

/// Owned MR sequence.
pub type MrSequence = heapless::Vec<MrSequenceEntry, MAX_SEQUENCE_LEN>;

/// Block for `delay` at `frequency`.
pub(crate) fn wait<H: MrcHardware>(hw: &mut H, frequency: Frequency, delay: GmfDelay) -> Result<()> {
    let nck = gmf_delay_nck(frequency, delay)?;
    if nck == 0 {
        return Ok(());
    }
    let ns = time_from_nck(nck, frequency)?.as_nanos();
    hw.delay_ns(u32::try_from(ns).map_err(|_| MrcError::TimingOverflow)?);
    Ok(())
}

/// Issue one MR write on `scope`.
pub(crate) fn write_mr<H: MrcHardware>(
    hw: &mut H,
    scope: RankScope,
    mr: ModeRegisterValue,
) -> core::result::Result<(), H::Error> {
    trace!("MRW MR{} <- {}", mr.index, mr.value);
    hw.write_register(scope, RegisterId::ModeRegister(mr.index), u32::from(mr.value))
}

/// Issue `entries` to one rank at the context's current frequency.
///
/// Entries whose MR is in `per_rank` carry a template value; the rank's
/// cached payload is written instead.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] for a rank outside the topology or not
///   populated.
/// - [`MrcError::HardwareAccess`] on the first failing write; later entries
///   are not issued.
pub fn issue_sequence<H: MrcHardware>(
    ctx: &mut MrcContext<H>,
    controller: u8,
    channel: u8,
    rank: u8,
    entries: &[MrSequenceEntry],
    per_rank: MrSet,
) -> Result<()> {
    if !ctx.topology().is_rank_present(controller, channel, rank) {
        return Err(MrcError::InvalidArgument);
    }
    let scope = RankScope::Rank { controller, channel, rank };
    let frequency = ctx.frequency();
    for entry in entries {
        let mr = if per_rank.contains(entry.mr.index) {
            ModeRegisterValue::new(entry.mr.index, ctx.cached_mr(controller, channel, rank, entry.mr.index)?)
        } else {
            entry.mr
        };
        write_mr(ctx.hw_mut(), scope, mr).map_err(|_| MrcError::HardwareAccess)?;
        wait(ctx.hw_mut(), frequency, entry.delay)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MrcConfig;
    use crate::context::Topology;
    use crate::mock::{MockEvent, MockHardware};
    use crate::mode_register::{MR12, MR2};

    fn ctx() -> MrcContext<MockHardware> {
        let mut c = MrcContext::new(MockHardware::new(), MrcConfig::default(), Topology::single_rank(), Frequency::F6400)
            .unwrap();
        c.load_default_mrs().unwrap();
        c
    }

    #[test]
    fn wait_converts_nck_to_ns() {
        let mut hw = MockHardware::new();
        // tFC_LONG at 6400 MT/s: 200 nCK = 250 ns
        wait(&mut hw, Frequency::F6400, GmfDelay::FcLong).unwrap();
        assert_eq!(hw.total_delay_ns(), 250);
        wait(&mut hw, Frequency::F6400, GmfDelay::None).unwrap();
        assert_eq!(hw.events().len(), 1);
    }

    #[test]
    fn per_rank_entries_use_cached_value() {
        let mut c = ctx();
        c.set_cached_mr(0, 0, 0, MR12, 0x42).unwrap();
        let entries = [
            MrSequenceEntry::new(ModeRegisterValue::new(MR2, 0x11), GmfDelay::Mrw),
            MrSequenceEntry::new(ModeRegisterValue::new(MR12, 0), GmfDelay::VrefCaLong),
        ];
        issue_sequence(&mut c, 0, 0, 0, &entries, MrSet::from_slice(&[MR12])).unwrap();
        let writes: heapless::Vec<(u8, u32), 4> =
            c.hw().mode_register_writes().map(|(_, mr, v)| (mr, v)).collect();
        assert_eq!(writes.as_slice(), &[(MR2, 0x11), (MR12, 0x42)]);
        assert!(matches!(c.hw().events().get(1), Some(MockEvent::Delay(_))));
    }

    #[test]
    fn absent_rank_rejected() {
        let mut c = ctx();
        let r = issue_sequence(&mut c, 0, 0, 1, &[], MrSet::EMPTY);
        assert_eq!(r, Err(MrcError::InvalidArgument));
    }

    #[test]
    fn failure_stops_sequence() {
        let mut c = ctx();
        c.hw_mut().fail_on_write(0);
        let entries = [MrSequenceEntry::new(ModeRegisterValue::new(MR2, 0x11), GmfDelay::Mrw); 3];
        let r = issue_sequence(&mut c, 0, 0, 0, &entries, MrSet::EMPTY);
        assert_eq!(r, Err(MrcError::HardwareAccess));
        assert!(c.hw().writes().is_empty());
    }
}
