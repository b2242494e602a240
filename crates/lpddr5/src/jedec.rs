//! JEDEC power-up initialization.
//!
//! The DRAM comes out of reset on FSP0 at an unknown setpoint. Training
//! runs at a low, safe data rate, but the final operating point is
//! programmed into FSP1 ahead of time so the switch after early command
//! training (ECT) is a single MR16 write.
//!
//! # Stages (per populated channel)
//!
//! ```text
//! 1. LowFrequency        clock → init rate (default 1100 MT/s)      tFC_LONG
//! 2. TargetReadLatency   MR2 (target RL/nWR) on FSP-OP0, every rank  tMRW
//! 3. FspWriteSwitch      MR16 FSP-WR=1 FSP-OP=0, every rank          tMRW
//! 4. ModeRegisterProgram MR1..MR41 (minus MR16), every rank          tMRW / tVREFCA_LONG / tODTUP
//! 5. HighFrequency       only after ECT: clock → target rate,
//!                        MR16 FSP-OP=1, every rank                   tFC_LONG
//! ```
//!
//! A failure aborts the whole init; nothing is rolled back and the channel
//! must be re-initialized from stage 1.

use crate::context::{rank_bit, MrcContext, MAX_RANK};
use crate::error::{InitStage, MrcError, Result};
use crate::hal::{MrcHardware, RankScope, RegisterId};
use crate::mode_register::{
    build_mr16, build_mr2, default_mr_image, Fsp, ModeRegisterValue, Mr16Fields, MrCache, MR11, MR12,
    MR14, MR15, MR16, MR17, MR18, MR41,
};
use crate::sequence::{wait, write_mr};
use crate::timing::{Frequency, GmfDelay};

/// Longest per-channel plan.
pub const MAX_JEDEC_STEPS: usize = 64;

/// One action of the init plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JedecAction {
    /// Retarget the channel clock.
    SetFrequency(Frequency),
    /// Mode-register write to one rank.
    ModeRegister {
        /// Rank index.
        rank: u8,
        /// Register and payload.
        mr: ModeRegisterValue,
    },
}

/// One planned step with its trailing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JedecStep {
    /// Stage this step belongs to.
    pub stage: InitStage,
    /// What to issue.
    pub action: JedecAction,
    /// Wait after the step.
    pub delay: GmfDelay,
    /// Data rate in effect once the step is issued; delays resolve against it.
    pub clock: Frequency,
}

/// Init plan of one channel.
pub type JedecPlan = heapless::Vec<JedecStep, MAX_JEDEC_STEPS>;

/// Delay that must follow a stage-4 write of `mr`.
const fn program_delay(mr: u8) -> GmfDelay {
    match mr {
        MR12 | MR14 | MR15 => GmfDelay::VrefCaLong,
        MR11 | MR17 | MR18 | MR41 => GmfDelay::CaOdtUpdate,
        _ => GmfDelay::Mrw,
    }
}

fn push(plan: &mut JedecPlan, step: JedecStep) -> Result<()> {
    plan.push(step).map_err(|_| MrcError::BufferTooSmall { required: MAX_JEDEC_STEPS.saturating_add(1) })
}

/// Build the init plan for one channel without touching hardware.
///
/// With `restore_mrs` the program comes from each rank's cache; otherwise
/// from the default MR image, skipping MRs in `restore_not_needed`.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] for a channel outside the topology or
///   without ranks.
/// - [`MrcError::UnsupportedFrequency`] if a rate has no latency table.
pub fn plan_jedec_init<H: MrcHardware>(ctx: &MrcContext<H>, controller: u8, channel: u8) -> Result<JedecPlan> {
    let mask = ctx.topology().rank_mask(controller, channel)?;
    if mask == 0 {
        return Err(MrcError::InvalidArgument);
    }
    let config = ctx.config();
    let low = config.init_frequency;
    let target = ctx.frequency();
    let ranks = (0u8..).take(MAX_RANK).filter(|&r| mask & rank_bit(r) != 0);

    let defaults = default_mr_image(target, ctx.bank_org()?, &ctx.channel_odt(controller, channel)?)?;

    let mut plan = JedecPlan::new();

    // 1
    push(
        &mut plan,
        JedecStep {
            stage: InitStage::LowFrequency,
            action: JedecAction::SetFrequency(low),
            delay: GmfDelay::FcLong,
            clock: low,
        },
    )?;

    // 2: FSP-OP0 must already decode the target read latency.
    let mr2 = build_mr2(target)?;
    for rank in ranks.clone() {
        push(
            &mut plan,
            JedecStep {
                stage: InitStage::TargetReadLatency,
                action: JedecAction::ModeRegister { rank, mr: mr2 },
                delay: GmfDelay::Mrw,
                clock: low,
            },
        )?;
    }

    // 3
    let fsp_switch = Mr16Fields { fsp_write: Some(Fsp::Fsp1), fsp_op: Some(Fsp::Fsp0), ..Mr16Fields::default() };
    for rank in ranks.clone() {
        let base = mr16_base(ctx, controller, channel, rank)?;
        push(
            &mut plan,
            JedecStep {
                stage: InitStage::FspWriteSwitch,
                action: JedecAction::ModeRegister { rank, mr: build_mr16(base, fsp_switch) },
                delay: GmfDelay::Mrw,
                clock: low,
            },
        )?;
    }

    // 4
    for rank in ranks.clone() {
        let image: MrCache = if config.restore_mrs {
            *ctx.rank_cache(controller, channel, rank)?
        } else {
            defaults
        };
        for mr in image.iter().filter(|mr| mr.index != MR16) {
            if !config.restore_mrs && config.restore_not_needed.contains(mr.index) {
                continue;
            }
            push(
                &mut plan,
                JedecStep {
                    stage: InitStage::ModeRegisterProgram,
                    action: JedecAction::ModeRegister { rank, mr },
                    delay: program_delay(mr.index),
                    clock: low,
                },
            )?;
        }
    }

    // 5
    if ctx.ect_done() {
        push(
            &mut plan,
            JedecStep {
                stage: InitStage::HighFrequency,
                action: JedecAction::SetFrequency(target),
                delay: GmfDelay::FcLong,
                clock: target,
            },
        )?;
        for rank in ranks {
            let base = build_mr16(mr16_base(ctx, controller, channel, rank)?, fsp_switch).value;
            let op1 = build_mr16(base, Mr16Fields { fsp_op: Some(Fsp::Fsp1), ..Mr16Fields::default() });
            push(
                &mut plan,
                JedecStep {
                    stage: InitStage::HighFrequency,
                    action: JedecAction::ModeRegister { rank, mr: op1 },
                    delay: GmfDelay::FcLong,
                    clock: target,
                },
            )?;
        }
    }

    Ok(plan)
}

/// MR16 value the FSP fields are merged into.
fn mr16_base<H: MrcHardware>(ctx: &MrcContext<H>, controller: u8, channel: u8, rank: u8) -> Result<u16> {
    if ctx.config().restore_mrs {
        ctx.cached_mr(controller, channel, rank, MR16)
    } else {
        Ok(0)
    }
}

/// Run [`plan_jedec_init`] on every populated channel and issue it.
///
/// The MR cache is not modified.
///
/// # Errors
///
/// - [`MrcError::InvalidArgument`] if no rank is populated.
/// - [`MrcError::InitSequenceFailed`] naming the stage of the first failing
///   write; earlier writes stay applied.
/// - Planning errors from [`plan_jedec_init`].
pub fn jedec_init<H: MrcHardware>(ctx: &mut MrcContext<H>) -> Result<()> {
    let topology = *ctx.topology();
    if topology.is_empty() {
        warn!("JEDEC init: no populated rank");
        return Err(MrcError::InvalidArgument);
    }
    for (controller, channel) in topology.populated_channels() {
        let plan = plan_jedec_init(ctx, controller, channel)?;
        info!(
            "JEDEC init mc{} ch{}: {} steps, restore {}",
            controller,
            channel,
            plan.len(),
            ctx.config().restore_mrs
        );
        for step in &plan {
            issue_step(ctx, controller, channel, step)?;
        }
    }
    Ok(())
}

fn issue_step<H: MrcHardware>(ctx: &mut MrcContext<H>, controller: u8, channel: u8, step: &JedecStep) -> Result<()> {
    let hw = ctx.hw_mut();
    let issued = match step.action {
        JedecAction::SetFrequency(frequency) => {
            debug!("{}: clock -> {} MT/s", step.stage.name(), frequency.mtps());
            hw.write_register(
                RankScope::Channel { controller, channel },
                RegisterId::ClockFrequency,
                frequency.mtps(),
            )
        }
        JedecAction::ModeRegister { rank, mr } => {
            write_mr(hw, RankScope::Rank { controller, channel, rank }, mr)
        }
    };
    if issued.is_err() {
        warn!("JEDEC init mc{} ch{} failed at {}", controller, channel, step.stage.name());
        return Err(MrcError::InitSequenceFailed { stage: step.stage });
    }
    wait(hw, step.clock, step.delay)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MrcConfig;
    use crate::context::Topology;
    use crate::mock::MockHardware;
    use crate::mode_register::{MrSet, MR1, MR2, MR28};

    fn ctx(config: MrcConfig, ranks: u8) -> MrcContext<MockHardware> {
        let topology = Topology::new().with_ranks(0, 1, ranks).unwrap();
        MrcContext::new(MockHardware::new(), config, topology, Frequency::F6400).unwrap()
    }

    fn stages(plan: &JedecPlan) -> heapless::Vec<InitStage, MAX_JEDEC_STEPS> {
        plan.iter().map(|s| s.stage).collect()
    }

    #[test]
    fn stages_are_ordered() {
        let mut c = ctx(MrcConfig::default(), 0b11);
        c.set_ect_done(true);
        let plan = plan_jedec_init(&c, 0, 1).unwrap();
        let order = [
            InitStage::LowFrequency,
            InitStage::TargetReadLatency,
            InitStage::FspWriteSwitch,
            InitStage::ModeRegisterProgram,
            InitStage::HighFrequency,
        ];
        let s = stages(&plan);
        let mut pos = 0;
        for st in s.iter() {
            while order.get(pos) != Some(st) {
                pos += 1;
                assert!(pos < order.len(), "stage {} out of order", st.name());
            }
        }
        assert_eq!(plan.first().unwrap().action, JedecAction::SetFrequency(Frequency::F1100));
    }

    #[test]
    fn stage_two_carries_target_read_latency() {
        let c = ctx(MrcConfig::default(), 0b01);
        let plan = plan_jedec_init(&c, 0, 1).unwrap();
        let step = plan.get(1).unwrap();
        assert_eq!(step.stage, InitStage::TargetReadLatency);
        assert_eq!(
            step.action,
            JedecAction::ModeRegister { rank: 0, mr: build_mr2(Frequency::F6400).unwrap() }
        );
        // and is issued at the init rate
        assert_eq!(step.clock, Frequency::F1100);
    }

    #[test]
    fn no_high_frequency_stage_before_ect() {
        let c = ctx(MrcConfig::default(), 0b01);
        let plan = plan_jedec_init(&c, 0, 1).unwrap();
        assert!(plan.iter().all(|s| s.stage != InitStage::HighFrequency));
    }

    #[test]
    fn mr16_only_in_fsp_stages() {
        let mut c = ctx(MrcConfig::default(), 0b01);
        c.set_ect_done(true);
        let plan = plan_jedec_init(&c, 0, 1).unwrap();
        let mr16: heapless::Vec<(InitStage, u16), 4> = plan
            .iter()
            .filter_map(|s| match s.action {
                JedecAction::ModeRegister { mr, .. } if mr.index == MR16 => Some((s.stage, mr.value)),
                _ => None,
            })
            .collect();
        assert_eq!(
            mr16.as_slice(),
            &[(InitStage::FspWriteSwitch, 0b0001), (InitStage::HighFrequency, 0b0101)]
        );
    }

    #[test]
    fn restore_not_needed_skipped_on_cold_init() {
        let config = MrcConfig::default().with_restore_not_needed(MrSet::from_slice(&[MR28]));
        let c = ctx(config, 0b01);
        let plan = plan_jedec_init(&c, 0, 1).unwrap();
        assert!(!plan.iter().any(|s| matches!(
            s.action,
            JedecAction::ModeRegister { mr, .. } if mr.index == MR28
        )));
    }

    #[test]
    fn restore_uses_cache() {
        let config = MrcConfig::default().with_restore_mrs(true);
        let mut c = ctx(config, 0b01);
        c.load_default_mrs().unwrap();
        c.set_cached_mr(0, 1, 0, MR1, 0x5A).unwrap();
        let plan = plan_jedec_init(&c, 0, 1).unwrap();
        assert!(plan.iter().any(|s| s.action
            == JedecAction::ModeRegister { rank: 0, mr: ModeRegisterValue::new(MR1, 0x5A) }));
    }

    #[test]
    fn vref_and_odt_delays() {
        assert_eq!(program_delay(MR12), GmfDelay::VrefCaLong);
        assert_eq!(program_delay(MR11), GmfDelay::CaOdtUpdate);
        assert_eq!(program_delay(MR2), GmfDelay::Mrw);
    }

    #[test]
    fn empty_channel_rejected() {
        let c = ctx(MrcConfig::default(), 0b01);
        assert_eq!(plan_jedec_init(&c, 0, 0), Err(MrcError::InvalidArgument));
        assert_eq!(plan_jedec_init(&c, 3, 0), Err(MrcError::InvalidArgument));
    }

    #[test]
    fn failure_reports_stage_and_stops() {
        let mut c = ctx(MrcConfig::default(), 0b01);
        // write 0: clock, 1: MR2, 2: MR16
        c.hw_mut().fail_on_write(2);
        assert_eq!(
            jedec_init(&mut c),
            Err(MrcError::InitSequenceFailed { stage: InitStage::FspWriteSwitch })
        );
        assert_eq!(c.hw().writes().len(), 2);
    }

    #[test]
    fn issues_every_planned_write() {
        let mut c = ctx(MrcConfig::default(), 0b11);
        let planned = plan_jedec_init(&c, 0, 1).unwrap().len();
        jedec_init(&mut c).unwrap();
        assert_eq!(c.hw().writes().len(), planned);
        assert!(c.hw().total_delay_ns() > 0);
    }
}
