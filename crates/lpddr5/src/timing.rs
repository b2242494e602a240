//! LPDDR5 timing arithmetic.
//!
//! Converts absolute JEDEC timing requirements (fs/ps/ns) into command-clock
//! cycles (nCK) for a given data rate, and looks up the frequency-indexed
//! latency tables (JESD209-5, WCK2CK sync AC parameters, 4:1 mode).
//!
//! # Clock relationship
//!
//! LPDDR5 runs WCK:CK at 4:1 and transfers data on both WCK edges, so one CK
//! period carries eight data beats:
//!
//! ```text
//! tCK = 8 / data_rate        6400 MT/s → 1250 ps,  1100 MT/s → 7272.7 ps
//! ```
//!
//! tCK is generally not an integer number of femtoseconds. Conversions are
//! therefore done on the exact ratio `time_fs * rate / 8e9` and rounded up,
//! never on a pre-rounded tCK.

use core::time::Duration;

use crate::bank::BankOrg;
use crate::error::{MrcError, Result};

/// Data beats per command clock in 4:1 WCK:CK mode.
const BEATS_PER_CK: u128 = 8;

/// Femtoseconds per microsecond-of-MT/s: `tCK_fs = 8 * 1e9 / rate_mtps`.
const FS_PER_CK_MTPS: u128 = BEATS_PER_CK * 1_000_000_000;

/// Precharge to precharge delay, all frequencies (nCK).
pub const T_PPD_NCK: u16 = 2;

// ─── Frequency ───────────────────────────────────────────────────────────────

/// LPDDR5 data rate in MT/s.
///
/// Any value can be represented; operations that need a table entry fail with
/// [`MrcError::UnsupportedFrequency`] when the rate is not in
/// [`SUPPORTED_FREQUENCIES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Frequency(u32);

impl Frequency {
    /// 1100 MT/s: the low setpoint used for JEDEC init and ECT.
    pub const F1100: Self = Self(1100);
    /// 3200 MT/s: highest rate in 16-bank mode.
    pub const F3200: Self = Self(3200);
    /// 6400 MT/s: highest LPDDR5 rate.
    pub const F6400: Self = Self(6400);

    /// Wrap a data rate in MT/s.
    #[must_use]
    pub const fn from_mtps(mtps: u32) -> Self {
        Self(mtps)
    }

    /// Data rate in MT/s.
    #[must_use]
    pub const fn mtps(self) -> u32 {
        self.0
    }

    /// `true` if the rate is one of [`SUPPORTED_FREQUENCIES`].
    #[must_use]
    pub fn is_supported(self) -> bool {
        SUPPORTED_FREQUENCIES.contains(&self)
    }

    /// Validate the rate against the supported set.
    ///
    /// # Errors
    ///
    /// [`MrcError::UnsupportedFrequency`] outside the supported set.
    pub fn supported(self) -> Result<Self> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(MrcError::UnsupportedFrequency)
        }
    }

    /// Index of the JEDEC frequency bin this rate falls into.
    ///
    /// Bin `n` is also the latency code `n + 1` written to MR1/MR2 (code 0
    /// is the ≤ 533 MT/s bin, which LPDDR5 init never uses).
    pub(crate) fn bin(self) -> Result<usize> {
        let rate = self.supported()?.0;
        FREQUENCY_BINS
            .iter()
            .position(|&upper| rate <= upper)
            .ok_or(MrcError::UnsupportedFrequency)
    }
}

impl core::fmt::Display for Frequency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} MT/s", self.0)
    }
}

/// Data rates the engine has tables for, ascending.
pub const SUPPORTED_FREQUENCIES: &[Frequency] = &[
    Frequency(1067),
    Frequency(1100),
    Frequency(1333),
    Frequency(1600),
    Frequency(1867),
    Frequency(2133),
    Frequency(2400),
    Frequency(2667),
    Frequency(2933),
    Frequency(3200),
    Frequency(3733),
    Frequency(4000),
    Frequency(4267),
    Frequency(4800),
    Frequency(5200),
    Frequency(5500),
    Frequency(6000),
    Frequency(6400),
];

/// Upper bound (inclusive, MT/s) of each JEDEC latency bin.
const FREQUENCY_BINS: [u32; 11] = [1067, 1600, 2133, 2750, 3200, 3733, 4267, 4800, 5500, 6000, 6400];

// ─── Unit conversion ─────────────────────────────────────────────────────────

/// Unit of an absolute timing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeUnit {
    /// Femtoseconds.
    Femtoseconds,
    /// Picoseconds.
    Picoseconds,
    /// Nanoseconds.
    Nanoseconds,
}

impl TimeUnit {
    const fn fs_per_unit(self) -> u128 {
        match self {
            Self::Femtoseconds => 1,
            Self::Picoseconds => 1_000,
            Self::Nanoseconds => 1_000_000,
        }
    }
}

/// Convert an absolute time into nCK at `frequency`, rounding up.
///
/// Formula: `nCK = ceil(time_fs * rate_mtps / 8e9)`. Rounding up guarantees
/// the electrical minimum is met.
///
/// # Errors
///
/// - [`MrcError::UnsupportedFrequency`] for a zero data rate.
/// - [`MrcError::TimingOverflow`] if the result exceeds `u16::MAX`.
pub fn nck_from_time(value: u64, unit: TimeUnit, frequency: Frequency) -> Result<u16> {
    let rate = u128::from(frequency.mtps());
    if rate == 0 {
        return Err(MrcError::UnsupportedFrequency);
    }
    let numer = u128::from(value)
        .checked_mul(unit.fs_per_unit())
        .and_then(|fs| fs.checked_mul(rate))
        .ok_or(MrcError::TimingOverflow)?;
    let cycles = numer.div_ceil(FS_PER_CK_MTPS);
    u16::try_from(cycles).map_err(|_| MrcError::TimingOverflow)
}

/// Wall-clock length of `nck` cycles at `frequency`, rounded up to whole ns.
///
/// Used when a sequence delay is handed to a `DelayNs` implementation.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] for a zero data rate.
pub fn time_from_nck(nck: u16, frequency: Frequency) -> Result<Duration> {
    let rate = u128::from(frequency.mtps());
    if rate == 0 {
        return Err(MrcError::UnsupportedFrequency);
    }
    // nck * 8000 / rate ns; cannot overflow u128 for a u16 cycle count.
    #[allow(clippy::arithmetic_side_effects)]
    let ns = (u128::from(nck) * BEATS_PER_CK * 1_000).div_ceil(rate);
    let ns = u64::try_from(ns).map_err(|_| MrcError::TimingOverflow)?;
    Ok(Duration::from_nanos(ns))
}

// ─── GMF delay timings ───────────────────────────────────────────────────────

/// Delay kinds attached to MR sequence entries and PHY command spacing.
///
/// Each kind is `max(ceil(time), min_nck)`; see [`gmf_delay_nck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GmfDelay {
    /// No wait after the entry.
    None,
    /// tMRW: MRW to MRW, max(10 ns, 5 nCK).
    Mrw,
    /// tMRD: MRW to any other command, max(14 ns, 5 nCK).
    Mrd,
    /// tVRCG_ENABLE: VREF current generator to high current, 150 ns.
    VrcgEnable,
    /// tVRCG_DISABLE: VREF current generator back to normal, 100 ns.
    VrcgDisable,
    /// tVREFCA_LONG: CA/DQ Vref settle after a large step, 250 ns.
    VrefCaLong,
    /// tODTUP: CA ODT value update time, 250 ns.
    CaOdtUpdate,
    /// tFC_LONG: frequency set point switch, 250 ns.
    FcLong,
    /// tCSPD: PDE to PDX (or PDX to PDE), max(7.5 ns, 3 nCK).
    Cspd,
    /// tXP: power-down exit to next valid command, max(7.5 ns, 3 nCK).
    Xp,
    /// tCMDPD: valid command to PDE, max(1.75 ns, 2 nCK).
    Cmdpd,
    /// tCSLCK: valid clock after PDE, max(5 ns, 3 nCK).
    Csclk,
    /// tCKCSH: valid clock for PDX, max(1.75 ns, 2 nCK).
    Ckcsh,
    /// tMRWPD: MRW to PDE, max(14 ns, 6 nCK).
    Mrwpd,
    /// tZQPD: ZQ calibration start to PDE, max(1.75 ns, 2 nCK).
    Zqpd,
    /// tCA2CS_PRE: CA low before CS rises, max(1.75 ns, 2 nCK).
    Ca2CsPre,
    /// tPPD: precharge to precharge, 2 nCK.
    Ppd,
    /// ECT: WCK toggling to DQ7 high, 5 ns.
    Wck2Dq7h,
    /// ECT: DQ7 high to WCK stop, 5 ns.
    Dq7hWck,
    /// ECT: DQ7 high to CK change, 5 ns.
    Dq7hCk,
    /// ECT: FSP switch to CA training ready, 20 ns.
    Adr,
    /// ECT: DQ7 low to WCK toggle, 5 ns.
    Dq7lWck,
}

impl GmfDelay {
    /// Absolute requirement and minimum cycle count for this delay.
    const fn requirement(self) -> (u64, TimeUnit, u16) {
        use TimeUnit::{Femtoseconds as Fs, Nanoseconds as Ns, Picoseconds as Ps};
        match self {
            Self::None => (0, Ps, 0),
            Self::Mrw => (10_000_000, Fs, 5),
            Self::Mrd => (14_000, Ps, 5),
            Self::VrcgEnable => (150, Ns, 0),
            Self::VrcgDisable => (100, Ns, 0),
            Self::VrefCaLong => (250_000, Ps, 0),
            Self::CaOdtUpdate => (250_000, Ps, 0),
            Self::FcLong => (250, Ns, 0),
            Self::Cspd => (7_500_000, Fs, 3),
            Self::Xp => (7_500_000, Fs, 3),
            Self::Cmdpd => (1_750, Ps, 2),
            Self::Csclk => (5_000, Ps, 3),
            Self::Ckcsh => (1_750, Ps, 2),
            Self::Mrwpd => (14_000, Ps, 6),
            Self::Zqpd => (1_750, Ps, 2),
            Self::Ca2CsPre => (1_750, Ps, 2),
            Self::Ppd => (0, Ps, T_PPD_NCK),
            Self::Wck2Dq7h | Self::Dq7hWck | Self::Dq7hCk | Self::Dq7lWck => (5_000, Ps, 0),
            Self::Adr => (20_000, Ps, 0),
        }
    }
}

/// Resolve a [`GmfDelay`] to nCK at `frequency`.
///
/// # Errors
///
/// - [`MrcError::UnsupportedFrequency`] for a zero data rate.
/// - [`MrcError::TimingOverflow`] if the delay does not fit in 16 bits.
pub fn gmf_delay_nck(frequency: Frequency, delay: GmfDelay) -> Result<u16> {
    let (value, unit, min_nck) = delay.requirement();
    Ok(nck_from_time(value, unit, frequency)?.max(min_nck))
}

// ─── Frequency-indexed latency tables ────────────────────────────────────────
//
// One column per FREQUENCY_BINS entry; 16B/BG mode, write latency set A,
// DBI and link ECC off, DVFSC disabled.

const READ_LATENCY: [u8; 11] = [4, 5, 6, 8, 9, 10, 12, 13, 15, 16, 17];
const WRITE_LATENCY_SET_A: [u8; 11] = [2, 3, 4, 4, 5, 6, 6, 7, 8, 9, 9];
const WRITE_RECOVERY: [u8; 11] = [10, 14, 19, 24, 28, 33, 37, 42, 47, 52, 56];
const WCK_PRE_STATIC: [u8; 11] = [1, 1, 2, 2, 2, 2, 3, 3, 4, 4, 4];
const WCK_PRE_TOGGLE_WR: u8 = 3;
const WCK_PRE_TOGGLE_RD: [u8; 11] = [3, 3, 4, 4, 4, 5, 5, 6, 6, 7, 7];
const WCK_ENL_FS: [u8; 11] = [0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3];

fn lookup(table: &[u8; 11], frequency: Frequency) -> Result<u8> {
    table
        .get(frequency.bin()?)
        .copied()
        .ok_or(MrcError::UnsupportedFrequency)
}

/// Read latency (nCK) at `frequency`.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn read_latency(frequency: Frequency) -> Result<u8> {
    lookup(&READ_LATENCY, frequency)
}

/// Write latency, set A (nCK) at `frequency`.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn write_latency(frequency: Frequency) -> Result<u8> {
    lookup(&WRITE_LATENCY_SET_A, frequency)
}

/// Write recovery nWR (nCK) at `frequency`.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn write_recovery(frequency: Frequency) -> Result<u8> {
    lookup(&WRITE_RECOVERY, frequency)
}

/// MR1/MR2 latency code for `frequency` (bin index + 1).
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn latency_code(frequency: Frequency) -> Result<u8> {
    let bin = frequency.bin()?;
    u8::try_from(bin)
        .ok()
        .and_then(|b| b.checked_add(1))
        .ok_or(MrcError::UnsupportedFrequency)
}

/// tWCKPRE_Static for reads and writes, 4:1 mode (nCK).
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn wck_pre_static(frequency: Frequency) -> Result<u8> {
    lookup(&WCK_PRE_STATIC, frequency)
}

/// tWCKENL_FS for CAS(WS_FAST), 4:1 mode (nCK).
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn wck_enl_fs(frequency: Frequency) -> Result<u8> {
    lookup(&WCK_ENL_FS, frequency)
}

/// tWCKPRE_total_WR = tWCKPRE_Static + tWCKPRE_Toggle_WR (nCK).
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn wck_pre_wr_total(frequency: Frequency) -> Result<u8> {
    wck_pre_static(frequency)?
        .checked_add(WCK_PRE_TOGGLE_WR)
        .ok_or(MrcError::TimingOverflow)
}

/// tWCKPRE_total_RD = tWCKPRE_Static + tWCKPRE_Toggle_RD (nCK).
///
/// Assumes DVFSC disabled and read DBI off.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn wck_pre_rd_total(frequency: Frequency) -> Result<u8> {
    wck_pre_static(frequency)?
        .checked_add(lookup(&WCK_PRE_TOGGLE_RD, frequency)?)
        .ok_or(MrcError::TimingOverflow)
}

/// Which ODT latency edge is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OdtlParam {
    /// ODTLon: termination enabled.
    On,
    /// ODTLoff: termination disabled.
    Off,
}

/// Burst length in nCK: BL32 in 8-bank mode, BL16 otherwise.
const fn burst_nck(org: BankOrg) -> i8 {
    match org {
        BankOrg::Bank8 => 4,
        BankOrg::Bank16 | BankOrg::BankGroup => 2,
    }
}

/// Write ODT latency relative to the write command (nCK).
///
/// ODTLon = WL − 2, ODTLoff = WL + BL/n + 1.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn wr_odtl(frequency: Frequency, param: OdtlParam, org: BankOrg) -> Result<i8> {
    let wl = i8::try_from(write_latency(frequency)?).map_err(|_| MrcError::TimingOverflow)?;
    let odtl = match param {
        OdtlParam::On => wl.checked_sub(2),
        OdtlParam::Off => wl.checked_add(burst_nck(org)).and_then(|v| v.checked_add(1)),
    };
    odtl.ok_or(MrcError::TimingOverflow)
}

/// Non-target read ODT latency relative to the read command (nCK).
///
/// ODTLon = RL − 3, ODTLoff = RL + 4 (BL16).
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`] outside the supported set.
pub fn nt_rd_odtl(frequency: Frequency, param: OdtlParam) -> Result<i8> {
    let rl = i8::try_from(read_latency(frequency)?).map_err(|_| MrcError::TimingOverflow)?;
    let odtl = match param {
        OdtlParam::On => rl.checked_sub(3),
        OdtlParam::Off => rl.checked_add(4),
    };
    odtl.ok_or(MrcError::TimingOverflow)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tck_at_6400_is_1250_ps() {
        // 1250 ps is exactly one cycle, 1251 ps rounds up to two.
        assert_eq!(nck_from_time(1_250, TimeUnit::Picoseconds, Frequency::F6400).unwrap(), 1);
        assert_eq!(nck_from_time(1_251, TimeUnit::Picoseconds, Frequency::F6400).unwrap(), 2);
    }

    #[test]
    fn conversion_rounds_up_never_down() {
        // 10 ns at 4267 MT/s = 5.33 nCK → 6
        assert_eq!(
            nck_from_time(10, TimeUnit::Nanoseconds, Frequency::from_mtps(4267)).unwrap(),
            6
        );
        // 7.5 ns at 1100 MT/s = 1.03 nCK → 2
        assert_eq!(
            nck_from_time(7_500_000, TimeUnit::Femtoseconds, Frequency::F1100).unwrap(),
            2
        );
    }

    #[test]
    fn units_agree() {
        let f = Frequency::from_mtps(3733);
        let ns = nck_from_time(250, TimeUnit::Nanoseconds, f).unwrap();
        let ps = nck_from_time(250_000, TimeUnit::Picoseconds, f).unwrap();
        let fs = nck_from_time(250_000_000, TimeUnit::Femtoseconds, f).unwrap();
        assert_eq!(ns, ps);
        assert_eq!(ps, fs);
    }

    #[test]
    fn zero_time_is_zero_cycles() {
        assert_eq!(nck_from_time(0, TimeUnit::Nanoseconds, Frequency::F6400).unwrap(), 0);
    }

    #[test]
    fn overflow_is_reported() {
        // 1 ms at 6400 MT/s = 800 000 nCK
        assert_eq!(
            nck_from_time(1_000_000, TimeUnit::Nanoseconds, Frequency::F6400),
            Err(MrcError::TimingOverflow)
        );
        assert_eq!(
            nck_from_time(u64::MAX, TimeUnit::Nanoseconds, Frequency::F6400),
            Err(MrcError::TimingOverflow)
        );
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(
            nck_from_time(10, TimeUnit::Nanoseconds, Frequency::from_mtps(0)),
            Err(MrcError::UnsupportedFrequency)
        );
    }

    #[test]
    fn time_from_nck_rounds_up_to_ns() {
        assert_eq!(time_from_nck(8, Frequency::F6400).unwrap(), Duration::from_nanos(10));
        // 1 nCK at 1100 MT/s = 7.27 ns → 8 ns
        assert_eq!(time_from_nck(1, Frequency::F1100).unwrap(), Duration::from_nanos(8));
    }

    #[test]
    fn gmf_min_nck_applies_at_low_rates() {
        // tMRW: 10 ns is 2 nCK at 1100 MT/s, floor of 5 nCK wins
        assert_eq!(gmf_delay_nck(Frequency::F1100, GmfDelay::Mrw).unwrap(), 5);
        // at 6400 MT/s the 10 ns term wins: 8 nCK
        assert_eq!(gmf_delay_nck(Frequency::F6400, GmfDelay::Mrw).unwrap(), 8);
    }

    #[test]
    fn gmf_long_delays_at_6400() {
        assert_eq!(gmf_delay_nck(Frequency::F6400, GmfDelay::FcLong).unwrap(), 200);
        assert_eq!(gmf_delay_nck(Frequency::F6400, GmfDelay::VrefCaLong).unwrap(), 200);
        assert_eq!(gmf_delay_nck(Frequency::F6400, GmfDelay::VrcgEnable).unwrap(), 120);
        assert_eq!(gmf_delay_nck(Frequency::F6400, GmfDelay::Ppd).unwrap(), 2);
        assert_eq!(gmf_delay_nck(Frequency::F6400, GmfDelay::None).unwrap(), 0);
    }

    #[test]
    fn every_supported_rate_has_a_bin() {
        for &f in SUPPORTED_FREQUENCIES {
            assert!(f.bin().is_ok(), "{f} has no latency bin");
            assert!(read_latency(f).unwrap() > write_latency(f).unwrap());
        }
    }

    #[test]
    fn unsupported_rate_has_no_table_entry() {
        assert_eq!(read_latency(Frequency::from_mtps(100)), Err(MrcError::UnsupportedFrequency));
        assert_eq!(read_latency(Frequency::from_mtps(7500)), Err(MrcError::UnsupportedFrequency));
    }

    #[test]
    fn latency_codes_at_bin_edges() {
        assert_eq!(latency_code(Frequency::from_mtps(1067)).unwrap(), 1);
        assert_eq!(latency_code(Frequency::F1100).unwrap(), 2);
        assert_eq!(latency_code(Frequency::F3200).unwrap(), 5);
        assert_eq!(latency_code(Frequency::F6400).unwrap(), 11);
    }

    #[test]
    fn wck_preamble_totals() {
        assert_eq!(wck_pre_wr_total(Frequency::F6400).unwrap(), 7);
        assert_eq!(wck_pre_rd_total(Frequency::F6400).unwrap(), 11);
        assert_eq!(wck_enl_fs(Frequency::F1100).unwrap(), 0);
    }

    #[test]
    fn write_odtl_depends_on_burst_length() {
        let f = Frequency::F6400;
        assert_eq!(wr_odtl(f, OdtlParam::On, BankOrg::Bank8).unwrap(), 7);
        assert_eq!(wr_odtl(f, OdtlParam::Off, BankOrg::Bank8).unwrap(), 14);
        assert_eq!(wr_odtl(f, OdtlParam::Off, BankOrg::BankGroup).unwrap(), 12);
        assert_eq!(nt_rd_odtl(f, OdtlParam::On).unwrap(), 14);
        assert_eq!(nt_rd_odtl(f, OdtlParam::Off).unwrap(), 21);
    }
}
