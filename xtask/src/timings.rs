use anyhow::{anyhow, Result};
use colored::Colorize;
use lpddr5::mock::MockHardware;
use lpddr5::timing::{
    gmf_delay_nck, latency_code, nt_rd_odtl, read_latency, wck_pre_rd_total, wck_pre_wr_total, wr_odtl,
    write_latency, write_recovery, OdtlParam, SUPPORTED_FREQUENCIES,
};
use lpddr5::{
    dqio_duration, jedec_init, select_bank_org, Frequency, GmfDelay, MrcConfig, MrcContext, MrcError, Topology,
};
use tracing_subscriber::EnvFilter;

fn engine(e: MrcError) -> anyhow::Error {
    anyhow!("lpddr5: {e}")
}

pub fn run(rate: Option<u32>, trace: bool) -> Result<()> {
    let rates: Vec<Frequency> = match rate {
        Some(mtps) => {
            let f = Frequency::from_mtps(mtps).supported().map_err(engine)?;
            vec![f]
        }
        None => SUPPORTED_FREQUENCIES.to_vec(),
    };

    println!();
    println!("{}", "⏱  LPDDR5 timing tables".cyan().bold());
    println!();
    println!(
        "{}",
        format!(
            "  {:>5}  {:>4} {:>3} {:>3} {:>3} {:>3}  {:>5} {:>5}  {:>6} {:>6}  {:>4} {:>5}  {:>9}",
            "MT/s", "code", "RL", "WL", "nWR", "OSC", "WCKwr", "WCKrd", "WODTon", "NTRoff", "tMRW", "tVREF", "banks"
        )
        .dimmed()
    );

    for f in rates {
        let org = select_bank_org(f).map_err(engine)?;
        println!(
            "  {:>5}  {:>4} {:>3} {:>3} {:>3} {:>3}  {:>5} {:>5}  {:>6} {:>6}  {:>4} {:>5}  {:>9}",
            f.mtps(),
            latency_code(f).map_err(engine)?,
            read_latency(f).map_err(engine)?,
            write_latency(f).map_err(engine)?,
            write_recovery(f).map_err(engine)?,
            dqio_duration(f).map_err(engine)?,
            wck_pre_wr_total(f).map_err(engine)?,
            wck_pre_rd_total(f).map_err(engine)?,
            wr_odtl(f, OdtlParam::On, org).map_err(engine)?,
            nt_rd_odtl(f, OdtlParam::Off).map_err(engine)?,
            gmf_delay_nck(f, GmfDelay::Mrw).map_err(engine)?,
            gmf_delay_nck(f, GmfDelay::VrefCaLong).map_err(engine)?,
            org.name(),
        );
    }
    println!();

    if trace {
        trace_init(rate.map_or(Frequency::F6400, Frequency::from_mtps))?;
    }
    Ok(())
}

/// Cold JEDEC init of one rank against the mock, with every write logged.
fn trace_init(frequency: Frequency) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lpddr5=trace")))
        .with_target(false)
        .init();

    println!("{}", format!("  Tracing JEDEC init at {frequency}...").cyan());
    let mut ctx = MrcContext::new(MockHardware::new(), MrcConfig::default(), Topology::single_rank(), frequency)
        .map_err(engine)?;
    ctx.load_default_mrs().map_err(engine)?;
    jedec_init(&mut ctx).map_err(engine)?;

    let hw = ctx.hw();
    let delay_us = hw.total_delay_ns() as f64 / 1_000.0;
    println!("{}", format!("  ✓ {} writes, {delay_us:.2} µs of delays", hw.writes().len()).green());
    println!();
    Ok(())
}
