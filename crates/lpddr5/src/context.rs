//! Per-boot engine state.
//!
//! [`MrcContext`] owns the hardware capability, the board configuration,
//! the current data rate, the populated topology and the per-rank MR cache.
//! Operations borrow it; state changes only through the setters below.

use crate::bank::{select_bank_org, BankOrg};
use crate::config::MrcConfig;
use crate::error::{MrcError, Result};
use crate::hal::MrcHardware;
use crate::mode_register::{default_mr_image, MrCache};
use crate::odt::{select_odt_table, OdtIndex, OdtValues};
use crate::timing::Frequency;

/// Memory controllers per SoC.
pub const MAX_CONTROLLER: usize = 2;
/// Channels per controller.
pub const MAX_CHANNEL: usize = 4;
/// Ranks per channel.
pub const MAX_RANK: usize = 2;

const RANK_MASK_ALL: u8 = 0b11;

/// Bit for `rank` in a rank mask; 0 for ranks past the mask width.
#[must_use]
pub fn rank_bit(rank: u8) -> u8 {
    1u8.checked_shl(u32::from(rank)).unwrap_or(0)
}

/// Which ranks are populated on each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Topology {
    rank_present: [[u8; MAX_CHANNEL]; MAX_CONTROLLER],
}

impl Topology {
    /// Nothing populated.
    #[must_use]
    pub const fn new() -> Self {
        Self { rank_present: [[0; MAX_CHANNEL]; MAX_CONTROLLER] }
    }

    /// One rank on controller 0, channel 0.
    #[must_use]
    pub const fn single_rank() -> Self {
        Self { rank_present: [[0b01, 0, 0, 0], [0; MAX_CHANNEL]] }
    }

    /// Mark `mask` ranks present on `controller`/`channel`.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] for an index outside the topology or a
    /// mask naming ranks past [`MAX_RANK`].
    pub fn with_ranks(mut self, controller: u8, channel: u8, mask: u8) -> Result<Self> {
        if mask & !RANK_MASK_ALL != 0 {
            return Err(MrcError::InvalidArgument);
        }
        let slot = self
            .rank_present
            .get_mut(usize::from(controller))
            .and_then(|c| c.get_mut(usize::from(channel)))
            .ok_or(MrcError::InvalidArgument)?;
        *slot = mask;
        Ok(self)
    }

    /// Present-rank mask of a channel.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] for an index outside the topology.
    pub fn rank_mask(&self, controller: u8, channel: u8) -> Result<u8> {
        self.rank_present
            .get(usize::from(controller))
            .and_then(|c| c.get(usize::from(channel)))
            .copied()
            .ok_or(MrcError::InvalidArgument)
    }

    /// `true` if the rank exists and is populated.
    #[must_use]
    pub fn is_rank_present(&self, controller: u8, channel: u8, rank: u8) -> bool {
        self.rank_mask(controller, channel)
            .is_ok_and(|mask| mask & rank_bit(rank) != 0)
    }

    /// `(controller, channel)` of every channel with at least one rank.
    pub fn populated_channels(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (0u8..).zip(self.rank_present.iter()).flat_map(|(controller, channels)| {
            (0u8..)
                .zip(channels.iter())
                .filter(|(_, mask)| **mask != 0)
                .map(move |(channel, _)| (controller, channel))
        })
    }

    /// `(controller, channel, rank)` of every populated rank.
    pub fn populated_ranks(&self) -> impl Iterator<Item = (u8, u8, u8)> + '_ {
        self.populated_channels().flat_map(move |(controller, channel)| {
            let mask = self.rank_mask(controller, channel).unwrap_or(0);
            (0u8..)
                .take(MAX_RANK)
                .filter(move |&rank| mask & rank_bit(rank) != 0)
                .map(move |rank| (controller, channel, rank))
        })
    }

    /// `true` if no rank is populated anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.populated_channels().next().is_none()
    }
}

type RankCaches = [[[MrCache; MAX_RANK]; MAX_CHANNEL]; MAX_CONTROLLER];

/// Engine state for one boot.
pub struct MrcContext<H> {
    hw: H,
    config: MrcConfig,
    frequency: Frequency,
    topology: Topology,
    caches: RankCaches,
    ect_done: bool,
}

impl<H: MrcHardware> MrcContext<H> {
    /// Build a context at the target `frequency`.
    ///
    /// The MR cache starts zeroed; call [`load_default_mrs`](Self::load_default_mrs)
    /// on a cold boot or populate it from the previous boot's image.
    ///
    /// # Errors
    ///
    /// [`MrcError::UnsupportedFrequency`] if `frequency` or the configured
    /// init frequency is outside the supported set.
    pub fn new(hw: H, config: MrcConfig, topology: Topology, frequency: Frequency) -> Result<Self> {
        frequency.supported()?;
        config.init_frequency.supported()?;
        Ok(Self {
            hw,
            config,
            frequency,
            topology,
            caches: [[[MrCache::default(); MAX_RANK]; MAX_CHANNEL]; MAX_CONTROLLER],
            ect_done: false,
        })
    }

    /// Hardware capability.
    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// Hardware capability, mutably.
    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Give back the hardware capability.
    pub fn into_hw(self) -> H {
        self.hw
    }

    /// Board configuration.
    pub fn config(&self) -> &MrcConfig {
        &self.config
    }

    /// Target data rate.
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Change the target data rate.
    ///
    /// # Errors
    ///
    /// [`MrcError::UnsupportedFrequency`] outside the supported set; the
    /// previous rate is kept.
    pub fn set_frequency(&mut self, frequency: Frequency) -> Result<()> {
        self.frequency = frequency.supported()?;
        debug!("target frequency {} MT/s", frequency.mtps());
        Ok(())
    }

    /// Populated topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// `true` once early command training has completed.
    pub fn ect_done(&self) -> bool {
        self.ect_done
    }

    /// Record early command training completion.
    pub fn set_ect_done(&mut self, done: bool) {
        self.ect_done = done;
    }

    /// Bank organisation at the target frequency, honouring the 8-bank
    /// override.
    ///
    /// # Errors
    ///
    /// [`MrcError::UnsupportedFrequency`] outside the supported set.
    pub fn bank_org(&self) -> Result<BankOrg> {
        if self.config.force_8_bank {
            Ok(BankOrg::Bank8)
        } else {
            select_bank_org(self.frequency)
        }
    }

    /// Board ODT entry for a channel, or the JEDEC defaults when the board
    /// has no table.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] for a channel outside the topology.
    pub fn channel_odt(&self, controller: u8, channel: u8) -> Result<OdtValues> {
        let ranks = self.topology.rank_mask(controller, channel)?.count_ones();
        let entry = OdtIndex::for_rank_count(ranks).and_then(|index| select_odt_table(self, 0, index));
        Ok(entry.copied().unwrap_or(OdtValues::JEDEC_DEFAULT))
    }

    fn cache(&self, controller: u8, channel: u8, rank: u8) -> Result<&MrCache> {
        self.caches
            .get(usize::from(controller))
            .and_then(|c| c.get(usize::from(channel)))
            .and_then(|c| c.get(usize::from(rank)))
            .ok_or(MrcError::InvalidArgument)
    }

    /// Cached MR image of one rank.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] for an index outside the topology.
    pub fn rank_cache(&self, controller: u8, channel: u8, rank: u8) -> Result<&MrCache> {
        self.cache(controller, channel, rank)
    }

    /// Cached payload of `mr` on one rank.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] for an index outside the topology or an
    /// uncached MR.
    pub fn cached_mr(&self, controller: u8, channel: u8, rank: u8, mr: u8) -> Result<u16> {
        self.cache(controller, channel, rank)?
            .get(mr)
            .ok_or(MrcError::InvalidArgument)
    }

    /// Store the payload of `mr` on one rank.
    ///
    /// # Errors
    ///
    /// [`MrcError::InvalidArgument`] for an index outside the topology or an
    /// uncached MR.
    pub fn set_cached_mr(&mut self, controller: u8, channel: u8, rank: u8, mr: u8, value: u16) -> Result<()> {
        self.caches
            .get_mut(usize::from(controller))
            .and_then(|c| c.get_mut(usize::from(channel)))
            .and_then(|c| c.get_mut(usize::from(rank)))
            .ok_or(MrcError::InvalidArgument)?
            .set(mr, value)
    }

    /// Fill the cache of every populated rank with the default MR image for
    /// the target frequency.
    ///
    /// # Errors
    ///
    /// Propagates [`default_mr_image`] errors.
    pub fn load_default_mrs(&mut self) -> Result<()> {
        let org = self.bank_org()?;
        let topology = self.topology;
        for (controller, channel) in topology.populated_channels() {
            let odt = self.channel_odt(controller, channel)?;
            let image = default_mr_image(self.frequency, org, &odt)?;
            for rank in (0u8..).take(MAX_RANK) {
                if topology.is_rank_present(controller, channel, rank) {
                    let slot = self
                        .caches
                        .get_mut(usize::from(controller))
                        .and_then(|c| c.get_mut(usize::from(channel)))
                        .and_then(|c| c.get_mut(usize::from(rank)))
                        .ok_or(MrcError::InvalidArgument)?;
                    *slot = image;
                }
            }
        }
        info!("default MR image loaded at {} MT/s", self.frequency.mtps());
        Ok(())
    }
}
