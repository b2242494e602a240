//! LPDDR5 timing and mode-register engine.
//!
//! This crate computes the JEDEC timing parameters and mode-register (MR)
//! payloads a memory controller needs to bring up LPDDR5 DRAM, and drives
//! the bring-up through a narrow hardware capability trait so the same
//! logic runs on silicon, in a simulator and against a recording mock.
//!
//! # Layers
//!
//! ```text
//! Flows        jedec  sagv  ppr  ect  dqio  vref
//!                 ↓
//! Builders     mode_register  odt  dimm_param  sequence
//!                 ↓
//! Tables       timing  bank
//!                 ↓
//! Capability   hal::MrcHardware (register access + DelayNs)
//! ```
//!
//! # Features
//!
//! - `std`: link the standard library (host builds)
//! - `defmt`: defmt derives and log output
//! - `tracing`: route log output to `tracing`
//! - `serde`: (de)serialize board configuration
//!
//! # Example
//!
//! ```
//! use lpddr5::{jedec_init, mock::MockHardware, Frequency, MrcConfig, MrcContext, Topology};
//!
//! let mut ctx = MrcContext::new(
//!     MockHardware::new(),
//!     MrcConfig::default(),
//!     Topology::single_rank(),
//!     Frequency::F6400,
//! )?;
//! ctx.load_default_mrs()?;
//! jedec_init(&mut ctx)?;
//! assert!(!ctx.hw().writes().is_empty());
//! # Ok::<(), lpddr5::MrcError>(())
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this register-level crate:
#![allow(clippy::doc_markdown)] // MR names and JEDEC symbols in doc comments
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)] // register accessors, callers decide
#![allow(clippy::match_same_arms)] // frequency tables read row by row
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
mod fmt;

pub mod bank;
pub mod config;
pub mod context;
pub mod dimm_param;
pub mod dqio;
pub mod ect;
pub mod error;
pub mod hal;
pub mod jedec;
pub mod mock;
pub mod mode_register;
pub mod odt;
pub mod ppr;
pub mod sagv;
pub mod sequence;
pub mod timing;
pub mod vref;

pub use bank::{select_bank_org, BankOrg};
pub use config::MrcConfig;
pub use context::{MrcContext, Topology};
pub use error::{InitStage, MrcError, Result};
pub use hal::{MrcHardware, RankScope, RegisterId};
pub use timing::{Frequency, GmfDelay, TimeUnit};

// Flows
pub use dqio::{dqio_duration, start_wck2dqi_oscillator};
pub use ect::{
    dq7_drive_plan, drive_dq7, restore_io_settings, set_rcomp_rx_mode, Dq7Step, IoSettingsSave, RcompSave,
};
pub use jedec::{jedec_init, plan_jedec_init};
pub use ppr::{repair, RowAddress};
pub use sagv::{build_sagv_sequence, sagv_required_len, SagvSequenceInfo};
pub use vref::{apply_vref_offset, decode_vref, encode_vref, MarginParam, VrefKind};

// Register-level types
pub use mode_register::{ModeRegisterValue, MrCache, MrSet};
pub use odt::{BoardType, DramWidth, OdtIndex, OdtValues};
pub use sequence::{issue_sequence, MrSequence, MrSequenceEntry};
