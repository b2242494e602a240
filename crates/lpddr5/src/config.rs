//! Board-level memory configuration.
//!
//! `MrcConfig` carries the inputs the boot firmware knows before training
//! starts: what board this is, what parts are fitted and how the previous
//! boot left the DRAM. Loading it from persistent storage is the firmware's
//! job; with the `serde` feature enabled it can be deserialized directly.

use crate::mode_register::MrSet;
use crate::odt::{BoardType, DramWidth};
use crate::timing::Frequency;

/// Memory-controller configuration for one boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MrcConfig {
    /// Board class, selects the ODT tables.
    pub board: BoardType,
    /// Width of the fitted DRAM devices.
    pub dram_width: DramWidth,
    /// Data rate used for JEDEC init and early training.
    pub init_frequency: Frequency,
    /// Program cached MR values instead of defaults (fast/warm boot).
    pub restore_mrs: bool,
    /// MRs left at their reset value during a cold init.
    pub restore_not_needed: MrSet,
    /// Run in 8-bank mode at every frequency.
    pub force_8_bank: bool,
}

impl Default for MrcConfig {
    fn default() -> Self {
        Self {
            board: BoardType::Mobile,
            dram_width: DramWidth::X16,
            init_frequency: Frequency::F1100,
            restore_mrs: false,
            restore_not_needed: MrSet::EMPTY,
            force_8_bank: false,
        }
    }
}

impl MrcConfig {
    /// Set the board class.
    #[must_use]
    pub const fn with_board(mut self, board: BoardType) -> Self {
        self.board = board;
        self
    }

    /// Set the DRAM device width.
    #[must_use]
    pub const fn with_dram_width(mut self, width: DramWidth) -> Self {
        self.dram_width = width;
        self
    }

    /// Set the JEDEC init data rate.
    #[must_use]
    pub const fn with_init_frequency(mut self, frequency: Frequency) -> Self {
        self.init_frequency = frequency;
        self
    }

    /// Program cached MR values during init.
    #[must_use]
    pub const fn with_restore_mrs(mut self, restore: bool) -> Self {
        self.restore_mrs = restore;
        self
    }

    /// Skip `mrs` during a cold init.
    #[must_use]
    pub const fn with_restore_not_needed(mut self, mrs: MrSet) -> Self {
        self.restore_not_needed = mrs;
        self
    }

    /// Force 8-bank mode.
    #[must_use]
    pub const fn with_force_8_bank(mut self, force: bool) -> Self {
        self.force_8_bank = force;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_init_frequency_is_1100() {
        let c = MrcConfig::default();
        assert_eq!(c.init_frequency, Frequency::F1100);
        assert!(!c.restore_mrs);
        assert!(c.restore_not_needed.is_empty());
    }

    #[test]
    fn builder_chain() {
        let c = MrcConfig::default()
            .with_board(BoardType::Embedded)
            .with_dram_width(DramWidth::X8)
            .with_restore_mrs(true)
            .with_force_8_bank(true);
        assert_eq!(c.board, BoardType::Embedded);
        assert_eq!(c.dram_width, DramWidth::X8);
        assert!(c.restore_mrs);
        assert!(c.force_8_bank);
    }
}
