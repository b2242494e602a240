//! Bank organisation selection.
//!
//! LPDDR5 devices expose three bank architectures, chosen per data rate and
//! programmed into MR3 OP[4:3]:
//!
//! | Mode        | Bank groups | Banks/group | Max rate  | MR3 OP[4:3] |
//! |-------------|-------------|-------------|-----------|-------------|
//! | `BankGroup` | 4           | 4           | 6400 MT/s | `00`        |
//! | `Bank8`     | 1           | 8           | 6400 MT/s | `01`        |
//! | `Bank16`    | 1           | 16          | 3200 MT/s | `10`        |

use crate::error::Result;
use crate::timing::Frequency;

/// Highest data rate at which 16-bank mode is legal.
pub const BANK16_MAX_RATE: Frequency = Frequency::F3200;

/// Row addresses are 18 bits wide (R0..R17).
pub const ROW_ADDRESS_BITS: u32 = 18;

const ROW_LIMIT: u32 = 1 << ROW_ADDRESS_BITS;

/// DRAM bank architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BankOrg {
    /// 4 bank groups × 4 banks, BL16/BL32.
    BankGroup,
    /// 8 banks, BL32 only.
    Bank8,
    /// 16 banks, BL16/BL32, up to 3200 MT/s.
    Bank16,
}

impl BankOrg {
    /// Short name for log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BankGroup => "BG",
            Self::Bank8 => "8B",
            Self::Bank16 => "16B",
        }
    }

    /// MR3 OP[4:3] encoding.
    #[must_use]
    pub const fn mr3_code(self) -> u8 {
        match self {
            Self::BankGroup => 0b00,
            Self::Bank8 => 0b01,
            Self::Bank16 => 0b10,
        }
    }

    /// Inverse of [`mr3_code`](Self::mr3_code); `None` for the reserved `11`.
    #[must_use]
    pub const fn from_mr3_code(code: u8) -> Option<Self> {
        match code & 0b11 {
            0b00 => Some(Self::BankGroup),
            0b01 => Some(Self::Bank8),
            0b10 => Some(Self::Bank16),
            _ => None,
        }
    }

    /// Number of addressable bank groups.
    #[must_use]
    pub const fn bank_groups(self) -> u8 {
        match self {
            Self::BankGroup => 4,
            Self::Bank8 | Self::Bank16 => 1,
        }
    }

    /// Banks per bank group.
    #[must_use]
    pub const fn banks_per_group(self) -> u8 {
        match self {
            Self::BankGroup => 4,
            Self::Bank8 => 8,
            Self::Bank16 => 16,
        }
    }

    /// `true` if `(bank_group, bank, row)` addresses a cell in this mode.
    #[must_use]
    pub const fn contains(self, bank_group: u8, bank: u8, row: u32) -> bool {
        bank_group < self.bank_groups()
            && bank < self.banks_per_group()
            && row < ROW_LIMIT
    }

    /// Flat bank number used for ACT/PRE commands and the MR25 resource map.
    ///
    /// In bank-group mode BA[1:0] carries the bank and BG[1:0] sits above it.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // masked operands, shift < 8
    pub const fn flat_bank(self, bank_group: u8, bank: u8) -> u8 {
        match self {
            Self::BankGroup => ((bank_group & 0b11) << 2) | (bank & 0b11),
            Self::Bank8 => bank & 0b111,
            Self::Bank16 => bank & 0b1111,
        }
    }
}

/// Bank organisation for `frequency`: 16-bank up to 3200 MT/s, bank-group
/// mode above.
///
/// # Errors
///
/// [`MrcError::UnsupportedFrequency`](crate::MrcError::UnsupportedFrequency)
/// outside the supported frequency set.
pub fn select_bank_org(frequency: Frequency) -> Result<BankOrg> {
    let frequency = frequency.supported()?;
    Ok(if frequency <= BANK16_MAX_RATE {
        BankOrg::Bank16
    } else {
        BankOrg::BankGroup
    })
}
