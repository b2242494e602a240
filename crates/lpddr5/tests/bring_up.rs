//! End-to-end bring-up flows against the recording mock controller.
//!
//! Each test drives the public API the way boot firmware would and checks
//! the register traffic the controller saw.

#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::unwrap_used, clippy::panic)]

use lpddr5::dimm_param::{dimm_opt_param_values, set_dimm_param_value, DimmOptParam};
use lpddr5::mock::MockHardware;
use lpddr5::mode_register::{default_mr_image, MrSet, MR12, MR14, MR16, MR2, MR25};
use lpddr5::sequence::MrSequenceEntry;
use lpddr5::{
    build_sagv_sequence, dqio_duration, jedec_init, repair, sagv_required_len, BankOrg, DramWidth,
    Frequency, GmfDelay, InitStage, ModeRegisterValue, MrcConfig, MrcContext, MrcError, RankScope,
    RegisterId, RowAddress, Topology,
};

fn context(config: MrcConfig, frequency: Frequency) -> MrcContext<MockHardware> {
    let mut ctx = MrcContext::new(MockHardware::new(), config, Topology::single_rank(), frequency).unwrap();
    ctx.load_default_mrs().unwrap();
    ctx
}

// ─── JEDEC init ──────────────────────────────────────────────────────────────

#[test]
fn cold_init_programs_defaults_regardless_of_cache() {
    let mut ctx = context(MrcConfig::default(), Frequency::F6400);
    let defaults =
        default_mr_image(Frequency::F6400, ctx.bank_org().unwrap(), &ctx.channel_odt(0, 0).unwrap()).unwrap();

    // Stale values from a previous boot must not leak into a cold init.
    ctx.set_cached_mr(0, 0, 0, MR12, 0x11).unwrap();
    ctx.set_cached_mr(0, 0, 0, MR14, 0x22).unwrap();
    jedec_init(&mut ctx).unwrap();

    for mr in [MR12, MR14] {
        let written: Vec<u32> = ctx
            .hw()
            .mode_register_writes()
            .filter(|&(_, index, _)| index == mr)
            .map(|(_, _, value)| value)
            .collect();
        assert_eq!(written, vec![u32::from(defaults.get(mr).unwrap())], "MR{mr}");
    }
    // Cache is left as the caller set it.
    assert_eq!(ctx.cached_mr(0, 0, 0, MR12).unwrap(), 0x11);
}

#[test]
fn cold_init_skips_restore_not_needed() {
    let config = MrcConfig::default().with_restore_not_needed(MrSet::from_slice(&[MR14]));
    let mut ctx = context(config, Frequency::F3200);
    jedec_init(&mut ctx).unwrap();
    assert!(ctx.hw().mode_register_writes().all(|(_, mr, _)| mr != MR14));
}

#[test]
fn warm_init_replays_cache() {
    let config = MrcConfig::default().with_restore_mrs(true);
    let mut ctx = context(config, Frequency::F6400);
    ctx.set_cached_mr(0, 0, 0, MR12, 0x33).unwrap();
    jedec_init(&mut ctx).unwrap();
    assert!(ctx.hw().mode_register_writes().any(|(_, mr, value)| mr == MR12 && value == 0x33));
}

#[test]
fn init_starts_at_low_frequency_and_sets_target_latency() {
    let mut ctx = context(MrcConfig::default(), Frequency::F6400);
    jedec_init(&mut ctx).unwrap();
    let writes = ctx.hw().writes();
    let first = writes.first().unwrap();
    assert_eq!(first.register, RegisterId::ClockFrequency);
    assert_eq!(first.value, 1100);
    let second = writes.get(1).unwrap();
    assert_eq!(second.mode_register(), Some(MR2));
    assert_eq!(second.scope, RankScope::Rank { controller: 0, channel: 0, rank: 0 });
}

#[test]
fn init_failure_names_stage() {
    let mut ctx = context(MrcConfig::default(), Frequency::F6400);
    // write 0 is the clock switch, write 1 the target MR2
    ctx.hw_mut().fail_on_write(2);
    assert_eq!(
        jedec_init(&mut ctx),
        Err(MrcError::InitSequenceFailed { stage: InitStage::FspWriteSwitch })
    );
    assert!(ctx.hw().mode_register_writes().all(|(_, mr, _)| mr != MR16));
}

// ─── SAGV ────────────────────────────────────────────────────────────────────

#[test]
fn sagv_short_buffer_then_retry() {
    let ctx = context(MrcConfig::default(), Frequency::F6400);
    let blank = MrSequenceEntry::new(ModeRegisterValue::new(0, 0), GmfDelay::None);

    let mut short = vec![blank; 3];
    let Err(MrcError::BufferTooSmall { required }) = build_sagv_sequence(&ctx, &mut short) else {
        panic!("expected BufferTooSmall");
    };
    assert_eq!(required, sagv_required_len(&ctx).unwrap());

    let mut out = vec![blank; required];
    let info = build_sagv_sequence(&ctx, &mut out).unwrap();
    assert_eq!(info.len, required);
    assert!(out.iter().all(|e| *e != blank));
}

#[test]
fn sagv_x8_is_one_shorter() {
    let x16 = context(MrcConfig::default(), Frequency::F6400);
    let x8 = context(MrcConfig::default().with_dram_width(DramWidth::X8), Frequency::F6400);
    assert_eq!(sagv_required_len(&x8).unwrap() + 1, sagv_required_len(&x16).unwrap());
}

// ─── DQIO ────────────────────────────────────────────────────────────────────

#[test]
fn dqio_duration_table_edges() {
    assert_eq!(dqio_duration(Frequency::F6400), Ok(16));
    assert_eq!(dqio_duration(Frequency::from_mtps(100)), Err(MrcError::UnsupportedTechnology));
}

// ─── PPR ─────────────────────────────────────────────────────────────────────

#[test]
fn malformed_bank16_repair_leaves_cache_unchanged() {
    let mut ctx = context(MrcConfig::default(), Frequency::F3200);
    ctx.hw_mut()
        .set_read(RankScope::Rank { controller: 0, channel: 0, rank: 0 }, RegisterId::ModeRegister(MR25), 0xFFFF)
        .unwrap();
    let snapshot = *ctx.rank_cache(0, 0, 0).unwrap();

    let bad = RowAddress { controller: 0, channel: 0, rank: 0, bank_group: 2, bank: 3, row: 100 };
    assert_eq!(repair(&mut ctx, bad, BankOrg::Bank16), Err(MrcError::RepairFailed));

    assert_eq!(*ctx.rank_cache(0, 0, 0).unwrap(), snapshot);
    assert!(ctx.hw().writes().is_empty());
}

// ─── DIMM parameters ─────────────────────────────────────────────────────────

#[test]
fn odt_write_values_are_distinct_and_validated() {
    let values = dimm_opt_param_values(DimmOptParam::OdtWr);
    assert!(!values.is_empty());
    for (i, a) in values.iter().enumerate() {
        assert!(values.iter().skip(i + 1).all(|b| b != a));
    }
    assert_eq!(set_dimm_param_value(0, DimmOptParam::OdtWr, 55), Err(MrcError::ValueNotSupported));
    for &ohms in values {
        assert!(set_dimm_param_value(0, DimmOptParam::OdtWr, ohms).is_ok());
    }
}
