//! Early command training PHY overrides.
//!
//! During ECT the DRAM signals CA training entry/exit on DQ7, so the PHY
//! must drive DQ7 directly instead of through the WCK-clocked data path.
//! The phy-init values of the WCK control registers are captured once and
//! put back by [`restore_io_settings`] when training ends.
//!
//! Each DQ7 edge follows a fixed plan ([`dq7_drive_plan`]) of PHY writes
//! and ECT waits:
//!
//! ```text
//! high: override  tx-en  ─tWCK2DQ7H─  DQ7=1  ─tDQ7HWCK─  ─tDQ7HCK─  ─tADR─
//! low:  override  tx-en  DQ7=0  ─tDQ7LWCK─
//! ```
//!
//! Receive Rcomp is likewise switched to an RX-only mode while the DRAM
//! drives the bus, see [`set_rcomp_rx_mode`].

use crate::context::{MrcContext, MAX_CHANNEL, MAX_CONTROLLER};
use crate::error::{MrcError, Result};
use crate::hal::{MrcHardware, RankScope, RegisterId};
use crate::sequence::wait;
use crate::timing::GmfDelay;

/// WckControl: hand DQ7 to the PHY override path.
pub const WCK_CONTROL_DQ7_OVERRIDE: u32 = 1 << 20;

/// WckControl1: keep the DQ7 transmitter enabled while WCK is stopped.
pub const WCK_CONTROL1_DQ7_TX_EN: u32 = 1 << 4;

/// DataRcomp: RX-only compensation mode.
pub const RCOMP_RX_MODE: u32 = 1 << 31;

/// Byte lanes per channel.
pub const BYTES_PER_CHANNEL: usize = 2;

/// Longest DQ7 edge plan.
pub const MAX_DQ7_STEPS: usize = 8;

/// One step of a DQ7 edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dq7Step {
    /// WckControl with the DQ7 override bit.
    WckOverride,
    /// WckControl1 with the DQ7 transmitter enabled.
    TxEnable,
    /// Drive DQ7 to the given level.
    Drive(u8),
    /// ECT wait, resolved at the current frequency.
    Wait(GmfDelay),
}

/// Ordered steps that drive DQ7 to `value` (0 or 1).
///
/// The rising edge waits tWCK2DQ7H before DQ7 goes high, then covers
/// tDQ7HWCK and tDQ7HCK so the caller may stop WCK and change CK, then tADR
/// for the FSP switch. The falling edge only waits tDQ7LWCK before WCK may
/// toggle again.
#[must_use]
pub fn dq7_drive_plan(value: u8) -> heapless::Vec<Dq7Step, MAX_DQ7_STEPS> {
    let level = value & 1;
    let steps: &[Dq7Step] = if level == 1 {
        &[
            Dq7Step::WckOverride,
            Dq7Step::TxEnable,
            Dq7Step::Wait(GmfDelay::Wck2Dq7h),
            Dq7Step::Drive(1),
            Dq7Step::Wait(GmfDelay::Dq7hWck),
            Dq7Step::Wait(GmfDelay::Dq7hCk),
            Dq7Step::Wait(GmfDelay::Adr),
        ]
    } else {
        &[
            Dq7Step::WckOverride,
            Dq7Step::TxEnable,
            Dq7Step::Drive(0),
            Dq7Step::Wait(GmfDelay::Dq7lWck),
        ]
    };
    steps.iter().copied().collect()
}

/// Phy-init WCK control values captured before the first DQ7 override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IoSettingsSave {
    /// WckControl.
    pub wck_control: u32,
    /// WckControl1.
    pub wck_control1: u32,
}

fn channels<H: MrcHardware>(ctx: &MrcContext<H>) -> heapless::Vec<(u8, u8), { MAX_CONTROLLER * MAX_CHANNEL }> {
    ctx.topology().populated_channels().collect()
}

/// Drive `value` on DQ7 of every populated channel, following
/// [`dq7_drive_plan`] with its waits at the context's frequency.
///
/// If `save` is empty the current WckControl/WckControl1 values are
/// captured into it first; a populated `save` is never overwritten, so
/// repeated calls keep the original phy-init values. Settings are not
/// restored here.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] if no channel is populated.
/// - [`MrcError::HardwareAccess`] if a register access fails.
/// - [`MrcError::TimingOverflow`] if a wait does not fit the delay provider.
pub fn drive_dq7<H: MrcHardware>(ctx: &mut MrcContext<H>, value: u8, save: &mut Option<IoSettingsSave>) -> Result<()> {
    let populated = channels(ctx);
    let &(controller, channel) = populated.first().ok_or(MrcError::InvalidArgument)?;

    let saved = match *save {
        Some(saved) => saved,
        None => {
            let scope = RankScope::Channel { controller, channel };
            let hw = ctx.hw_mut();
            let captured = IoSettingsSave {
                wck_control: hw
                    .read_register(scope, RegisterId::WckControl)
                    .map_err(|_| MrcError::HardwareAccess)?,
                wck_control1: hw
                    .read_register(scope, RegisterId::WckControl1)
                    .map_err(|_| MrcError::HardwareAccess)?,
            };
            *save = Some(captured);
            captured
        }
    };

    let frequency = ctx.frequency();
    let hw = ctx.hw_mut();
    for step in dq7_drive_plan(value) {
        let (register, written) = match step {
            Dq7Step::WckOverride => (RegisterId::WckControl, saved.wck_control | WCK_CONTROL_DQ7_OVERRIDE),
            Dq7Step::TxEnable => (RegisterId::WckControl1, saved.wck_control1 | WCK_CONTROL1_DQ7_TX_EN),
            Dq7Step::Drive(level) => (RegisterId::Dq7Drive, u32::from(level)),
            Dq7Step::Wait(delay) => {
                wait(hw, frequency, delay)?;
                continue;
            }
        };
        for &(controller, channel) in &populated {
            hw.write_register(RankScope::Channel { controller, channel }, register, written)
                .map_err(|_| MrcError::HardwareAccess)?;
        }
    }
    trace!("DQ7 <- {}", value & 1);
    Ok(())
}

/// Write the captured WCK control values back and clear `save`.
///
/// A no-op when nothing was captured.
///
/// # Errors
///
/// [`MrcError::HardwareAccess`] if a write fails; `save` is kept so the
/// restore can be retried.
pub fn restore_io_settings<H: MrcHardware>(ctx: &mut MrcContext<H>, save: &mut Option<IoSettingsSave>) -> Result<()> {
    let Some(saved) = *save else {
        return Ok(());
    };
    let populated = channels(ctx);
    let hw = ctx.hw_mut();
    for &(controller, channel) in &populated {
        let scope = RankScope::Channel { controller, channel };
        hw.write_register(scope, RegisterId::WckControl, saved.wck_control)
            .map_err(|_| MrcError::HardwareAccess)?;
        hw.write_register(scope, RegisterId::WckControl1, saved.wck_control1)
            .map_err(|_| MrcError::HardwareAccess)?;
    }
    *save = None;
    debug!("WCK control restored on {} channels", populated.len());
    Ok(())
}

/// Saved DataRcomp values, per controller, channel and byte lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RcompSave {
    values: [[[Option<u32>; BYTES_PER_CHANNEL]; MAX_CHANNEL]; MAX_CONTROLLER],
}

impl RcompSave {
    /// Saved value of one byte lane.
    #[must_use]
    pub fn get(&self, controller: u8, channel: u8, byte: u8) -> Option<u32> {
        self.values
            .get(usize::from(controller))
            .and_then(|c| c.get(usize::from(channel)))
            .and_then(|c| c.get(usize::from(byte)))
            .copied()
            .flatten()
    }

    fn slot(&mut self, controller: u8, channel: u8, byte: u8) -> Result<&mut Option<u32>> {
        self.values
            .get_mut(usize::from(controller))
            .and_then(|c| c.get_mut(usize::from(channel)))
            .and_then(|c| c.get_mut(usize::from(byte)))
            .ok_or(MrcError::InvalidArgument)
    }
}

/// Enter (`set`) or leave RX-only Rcomp mode on every populated channel.
///
/// Entering saves each byte's current value unless one is already saved.
/// Leaving writes the saved values back and clears them.
///
/// # Errors
///
/// [`MrcError::HardwareAccess`] if a register access fails.
pub fn set_rcomp_rx_mode<H: MrcHardware>(ctx: &mut MrcContext<H>, set: bool, save: &mut RcompSave) -> Result<()> {
    let populated = channels(ctx);
    let hw = ctx.hw_mut();
    for &(controller, channel) in &populated {
        let scope = RankScope::Channel { controller, channel };
        for byte in (0u8..).take(BYTES_PER_CHANNEL) {
            let register = RegisterId::DataRcomp { byte };
            let slot = save.slot(controller, channel, byte)?;
            if set {
                let base = match *slot {
                    Some(v) => v,
                    None => {
                        let v = hw.read_register(scope, register).map_err(|_| MrcError::HardwareAccess)?;
                        *slot = Some(v);
                        v
                    }
                };
                hw.write_register(scope, register, base | RCOMP_RX_MODE)
                    .map_err(|_| MrcError::HardwareAccess)?;
            } else if let Some(v) = slot.take() {
                hw.write_register(scope, register, v).map_err(|_| MrcError::HardwareAccess)?;
            }
        }
    }
    debug!("Rcomp RX mode {}", set);
    Ok(())
}
