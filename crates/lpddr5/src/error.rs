//! Error taxonomy for the LPDDR5 engine.
//!
//! Leaf computations return `Result<_, MrcError>`; composite builders
//! short-circuit on the first error and surface it unchanged. Nothing is
//! retried internally.

use thiserror_no_std::Error;

/// Stage of the JEDEC init sequence, reported by [`MrcError::InitSequenceFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStage {
    /// Switch to the low initial frequency.
    LowFrequency,
    /// FSP-OP0 MR2 carrying the target read latency.
    TargetReadLatency,
    /// MR16 FSP-WR = 1, FSP-OP = 0.
    FspWriteSwitch,
    /// Full MR program.
    ModeRegisterProgram,
    /// Switch to the target frequency and FSP-OP = 1 after ECT.
    HighFrequency,
}

impl InitStage {
    /// Short name for log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LowFrequency => "low-freq",
            Self::TargetReadLatency => "target-rl",
            Self::FspWriteSwitch => "fsp-wr",
            Self::ModeRegisterProgram => "mr-program",
            Self::HighFrequency => "high-freq",
        }
    }
}

/// Errors returned by the LPDDR5 engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MrcError {
    /// A required input is absent or outside the context topology.
    #[error("invalid argument")]
    InvalidArgument,
    /// The parameter kind is not handled by this operation.
    #[error("unsupported parameter")]
    UnsupportedParameter,
    /// The data rate is outside the supported LPDDR5 frequency set.
    #[error("unsupported frequency")]
    UnsupportedFrequency,
    /// No table entry exists for this technology/frequency combination.
    #[error("unsupported technology")]
    UnsupportedTechnology,
    /// The value is in the parameter's domain but has no hardware encoding.
    #[error("value not supported")]
    ValueNotSupported,
    /// A register encoding is outside its valid domain.
    #[error("invalid encoding")]
    InvalidEncoding,
    /// A computed timing does not fit in 16 bits of nCK.
    #[error("timing overflow")]
    TimingOverflow,
    /// The caller's output buffer is too small; retry with `required` entries.
    #[error("buffer too small: {required} entries required")]
    BufferTooSmall {
        /// Exact number of entries the sequence needs.
        required: usize,
    },
    /// A hardware write inside the JEDEC init sequence failed.
    #[error("JEDEC init sequence failed at {}", .stage.name())]
    InitSequenceFailed {
        /// Stage that was being issued.
        stage: InitStage,
    },
    /// A step of the post-package repair failed; the row is not repaired.
    #[error("post package repair failed")]
    RepairFailed,
    /// A single register access outside a multi-step sequence failed.
    #[error("hardware access failed")]
    HardwareAccess,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MrcError>;
