//! Hardware-access capability.
//!
//! The engine never touches memory-controller registers directly. Every
//! mode-register write, MPC command, row command and PHY override goes
//! through [`MrcHardware`], which the boot firmware implements on top of its
//! controller PAC and the test suite implements with
//! [`MockHardware`](crate::mock::MockHardware).
//!
//! Delays between commands are honoured through the `DelayNs` supertrait, so
//! a single object owns both the register path and the timebase.

use embedded_hal::delay::DelayNs;

/// Target of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RankScope {
    /// One channel of one controller (clock setpoint, PHY overrides, Rcomp).
    Channel {
        /// Memory controller index.
        controller: u8,
        /// Channel index within the controller.
        channel: u8,
    },
    /// One rank (DRAM commands and mode registers).
    Rank {
        /// Memory controller index.
        controller: u8,
        /// Channel index within the controller.
        channel: u8,
        /// Rank index within the channel.
        rank: u8,
    },
}

/// Register or command addressed by a hardware access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterId {
    /// Mode register write (MRW) or read (MRR) of the given MR number.
    ModeRegister(u8),
    /// Multi-purpose command; the written value is the MPC opcode.
    Mpc,
    /// ACTIVATE; the written value is the packed row address.
    Activate {
        /// Flat bank number.
        bank: u8,
    },
    /// PRECHARGE of a single bank.
    Precharge {
        /// Flat bank number.
        bank: u8,
    },
    /// PRECHARGE all banks.
    PrechargeAll,
    /// Channel clock setpoint; the written value is the data rate in MT/s.
    ClockFrequency,
    /// PHY WCK control register.
    WckControl,
    /// PHY WCK control register 1.
    WckControl1,
    /// PHY DQ7 drive override; the written value is the pin level.
    Dq7Drive,
    /// PHY data Rcomp register for one byte lane.
    DataRcomp {
        /// Byte lane.
        byte: u8,
    },
}

/// Register and command access to the memory controller.
///
/// Implementations must be blocking: a write returns once the command has
/// been issued on the bus. Timing between commands is the caller's job and
/// is expressed through the [`DelayNs`] supertrait.
pub trait MrcHardware: DelayNs {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read a register (MRR for mode registers).
    fn read_register(&mut self, scope: RankScope, register: RegisterId) -> Result<u32, Self::Error>;

    /// Write a register or issue a command.
    fn write_register(
        &mut self,
        scope: RankScope,
        register: RegisterId,
        value: u32,
    ) -> Result<(), Self::Error>;
}
