//! Post-package repair (hard PPR).
//!
//! Replaces a failing row with a spare row fused inside the DRAM. The
//! command flow is fixed by JESD209-5B section 7.7.5:
//!
//! ```text
//! PREab ─tPPD─ MRW MR41 PPRE=1 ─tMRD─ ACT(row) ─tPGM─ PRE(bank) ─tPGM_Exit─
//!        MRW MR41 PPRE=0 ─tPGMPST─ done
//! ```
//!
//! Spare rows are a per-bank resource reported in MR25. A repair is
//! permanent; nothing here is retried.

use crate::bank::BankOrg;
use crate::context::MrcContext;
use crate::error::{MrcError, Result};
use crate::hal::{MrcHardware, RankScope, RegisterId};
use crate::mode_register::{build_mr41, ModeRegisterValue, MR25, MR41};
use crate::sequence::{wait, write_mr};
use crate::timing::GmfDelay;

/// tPGM: ACT to PRE during hard PPR (ms).
pub const T_PGM_MS: u32 = 1_000;

/// tPGM_Exit: PRE to PPR exit (ns).
pub const T_PGM_EXIT_NS: u32 = 15;

/// tPGMPST: PPR exit to next valid command (µs).
pub const T_PGMPST_US: u32 = 50;

const ROW_MASK: u32 = 0x3_FFFF;

/// Failing row to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RowAddress {
    /// Memory controller.
    pub controller: u8,
    /// Channel within the controller.
    pub channel: u8,
    /// Rank within the channel.
    pub rank: u8,
    /// Bank group (0 outside bank-group mode).
    pub bank_group: u8,
    /// Bank within the group.
    pub bank: u8,
    /// Row address R[17:0].
    pub row: u32,
}

/// ACT command row payload.
///
/// ACT-1 carries R[17:14] and R[13:11], ACT-2 carries R[10:7] and R[6:0];
/// the controller splits the packed value into the two command cycles.
#[must_use]
pub const fn pack_row(row: u32) -> u32 {
    row & ROW_MASK
}

/// Repair `address` using the spare row of its bank.
///
/// Validation happens before any hardware access: an address outside
/// `bank_mode` or on an absent rank fails without traffic. The MR cache is
/// never modified; MR41 is restored from it on exit.
///
/// # Errors
///
/// [`MrcError::RepairFailed`] for an invalid address, no spare resource in
/// the bank, or any failing command.
pub fn repair<H: MrcHardware>(ctx: &mut MrcContext<H>, address: RowAddress, bank_mode: BankOrg) -> Result<()> {
    let RowAddress { controller, channel, rank, bank_group, bank, row } = address;
    if !bank_mode.contains(bank_group, bank, row) || !ctx.topology().is_rank_present(controller, channel, rank) {
        warn!(
            "PPR: invalid address mc{} ch{} r{} bg{} ba{} row {} in {}",
            controller,
            channel,
            rank,
            bank_group,
            bank,
            row,
            bank_mode.name()
        );
        return Err(MrcError::RepairFailed);
    }
    let mr41 = ctx
        .cached_mr(controller, channel, rank, MR41)
        .map_err(|_| MrcError::RepairFailed)?;
    let flat = bank_mode.flat_bank(bank_group, bank);
    let frequency = ctx.frequency();
    let scope = RankScope::Rank { controller, channel, rank };
    let hw = ctx.hw_mut();

    let resources = hw
        .read_register(scope, RegisterId::ModeRegister(MR25))
        .map_err(|_| MrcError::RepairFailed)?;
    let available = 1u32.checked_shl(u32::from(flat)).is_some_and(|bit| resources & bit != 0);
    if !available {
        warn!("PPR: no spare row in bank {} (MR25 = {})", flat, resources);
        return Err(MrcError::RepairFailed);
    }

    info!("PPR: mc{} ch{} r{} bank {} row {}", controller, channel, rank, flat, row);
    let step = |r: core::result::Result<(), H::Error>| r.map_err(|_| MrcError::RepairFailed);

    step(hw.write_register(scope, RegisterId::PrechargeAll, 0))?;
    wait(hw, frequency, GmfDelay::Ppd).map_err(|_| MrcError::RepairFailed)?;

    step(write_mr(hw, scope, build_mr41(mr41, None, Some(true))))?;
    wait(hw, frequency, GmfDelay::Mrd).map_err(|_| MrcError::RepairFailed)?;
    debug!("PPR: entered, programming row");

    step(hw.write_register(scope, RegisterId::Activate { bank: flat }, pack_row(row)))?;
    hw.delay_ms(T_PGM_MS);

    step(hw.write_register(scope, RegisterId::Precharge { bank: flat }, 0))?;
    hw.delay_ns(T_PGM_EXIT_NS);

    step(write_mr(hw, scope, ModeRegisterValue::new(MR41, mr41)))?;
    hw.delay_us(T_PGMPST_US);

    info!("PPR: bank {} row {} repaired", flat, row);
    Ok(())
}
