//! WCK2DQI interval oscillator.
//!
//! The DRAM measures WCK-to-DQ input delay drift with a ring oscillator
//! that runs for the time programmed in MR37. Longer runs give finer
//! resolution; the run time scales with the data rate so the count stays
//! in range.

use crate::context::{rank_bit, MrcContext, MAX_RANK};
use crate::error::{MrcError, Result};
use crate::hal::{MrcHardware, RankScope, RegisterId};
use crate::mode_register::build_mr37;
use crate::sequence::{wait, write_mr};
use crate::timing::{Frequency, GmfDelay};

/// MPC opcode: start WCK2DQI oscillator.
pub const MPC_START_WCK2DQI_OSC: u32 = 0x81;

/// MR37 run-time code for `frequency`.
///
/// # Errors
///
/// [`MrcError::UnsupportedTechnology`] for a rate without a table entry.
pub fn dqio_duration(frequency: Frequency) -> Result<u8> {
    let code = match frequency.mtps() {
        1067 | 1100 => 3,
        1333 | 1600 => 4,
        1867 => 5,
        2133 | 2400 => 6,
        2667 => 7,
        2933 | 3200 => 8,
        3733 | 4000 => 10,
        4267 => 11,
        4800 => 12,
        5200 => 13,
        5500 => 14,
        6000 => 15,
        6400 => 16,
        _ => return Err(MrcError::UnsupportedTechnology),
    };
    Ok(code)
}

/// Program MR37 and start the oscillator on the selected ranks.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] for a channel outside the topology.
/// - [`MrcError::UnsupportedTechnology`] at an unknown rate.
/// - [`MrcError::HardwareAccess`] if a write fails.
pub fn start_wck2dqi_oscillator<H: MrcHardware>(
    ctx: &mut MrcContext<H>,
    controller: u8,
    channel: u8,
    rank_mask: u8,
) -> Result<()> {
    let frequency = ctx.frequency();
    let mr37 = build_mr37(dqio_duration(frequency)?);
    let targets = ctx.topology().rank_mask(controller, channel)? & rank_mask;
    for rank in (0u8..).take(MAX_RANK).filter(|&r| targets & rank_bit(r) != 0) {
        let scope = RankScope::Rank { controller, channel, rank };
        let hw = ctx.hw_mut();
        write_mr(hw, scope, mr37).map_err(|_| MrcError::HardwareAccess)?;
        wait(hw, frequency, GmfDelay::Mrw)?;
        hw.write_register(scope, RegisterId::Mpc, MPC_START_WCK2DQI_OSC)
            .map_err(|_| MrcError::HardwareAccess)?;
    }
    Ok(())
}
