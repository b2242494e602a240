//! Optimisable DIMM parameters and their mode-register fields.
//!
//! Training sweeps drive strength and termination by parameter kind; this
//! module maps each kind to the MR that holds it and to its legal values.

use crate::error::{MrcError, Result};
use crate::mode_register::{extract_field, insert_field, MR11, MR3, MR41, MR_INIT_LIST};
use crate::odt::{rzq_code, ODT_OFF};

/// DRAM-side parameter swept during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DimmOptParam {
    /// Pull-down drive strength (MR3 PDDS).
    Ron,
    /// DQ write termination (MR11 DQ ODT).
    OdtWr,
    /// Non-target DQ termination (MR41 NT ODT).
    OdtNom,
    /// CA termination (MR11 CA ODT).
    OdtPark,
}

impl DimmOptParam {
    /// Short name for log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ron => "Ron",
            Self::OdtWr => "OdtWr",
            Self::OdtNom => "OdtNom",
            Self::OdtPark => "OdtPark",
        }
    }
}

/// Where a parameter lives: slot in the per-rank MR cache and MR number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DimmParamMr {
    /// Slot in [`MrCache`](crate::mode_register::MrCache).
    pub index: usize,
    /// MR number.
    pub address: u8,
}

/// Drive strengths in encoding order (PDDS codes 1..=6).
const RON_VALUES: [u16; 6] = [240, 120, 80, 60, 48, 40];

/// Terminations in encoding order (codes 0..=6, 0 = off).
const ODT_VALUES: [u16; 7] = [ODT_OFF, 240, 120, 80, 60, 48, 40];

/// Bit position and width of the parameter within its MR.
const fn field(param: DimmOptParam) -> (u8, u32, u32) {
    match param {
        DimmOptParam::Ron => (MR3, 0, 3),
        DimmOptParam::OdtWr => (MR11, 0, 3),
        DimmOptParam::OdtNom => (MR41, 5, 3),
        DimmOptParam::OdtPark => (MR11, 4, 3),
    }
}

const MR3_SLOT: usize = 2;
const MR11_SLOT: usize = 4;
const MR41_SLOT: usize = 17;

const _: () = assert!(
    MR_INIT_LIST[MR3_SLOT] == MR3 && MR_INIT_LIST[MR11_SLOT] == MR11 && MR_INIT_LIST[MR41_SLOT] == MR41
);

/// Cache slot and MR number holding `param`.
#[must_use]
pub const fn resolve_dimm_opt_param(param: DimmOptParam) -> DimmParamMr {
    let (address, _, _) = field(param);
    let index = match param {
        DimmOptParam::Ron => MR3_SLOT,
        DimmOptParam::OdtWr | DimmOptParam::OdtPark => MR11_SLOT,
        DimmOptParam::OdtNom => MR41_SLOT,
    };
    DimmParamMr { index, address }
}

/// Legal Ohm values of `param`, ordered by increasing encoding.
#[must_use]
pub fn dimm_opt_param_values(param: DimmOptParam) -> &'static [u16] {
    match param {
        DimmOptParam::Ron => &RON_VALUES,
        DimmOptParam::OdtWr | DimmOptParam::OdtNom | DimmOptParam::OdtPark => &ODT_VALUES,
    }
}

/// Write `ohms` into the field of `param` within `mr_value`.
///
/// Only [`DimmOptParam::Ron`] and [`DimmOptParam::OdtWr`] are settable
/// through this path; the others are fixed by the board ODT table.
///
/// # Errors
///
/// - [`MrcError::UnsupportedParameter`] for `OdtNom` and `OdtPark`.
/// - [`MrcError::ValueNotSupported`] if `ohms` is not a legal value.
pub fn set_dimm_param_value(mr_value: u16, param: DimmOptParam, ohms: u16) -> Result<u16> {
    let code = match param {
        DimmOptParam::Ron => RON_VALUES
            .iter()
            .position(|&v| v == ohms)
            .and_then(|i| u16::try_from(i).ok())
            .and_then(|i| i.checked_add(1)),
        DimmOptParam::OdtWr => rzq_code(ohms).map(u16::from),
        DimmOptParam::OdtNom | DimmOptParam::OdtPark => {
            warn!("DIMM param {} is not settable", param.name());
            return Err(MrcError::UnsupportedParameter);
        }
    };
    let Some(code) = code else {
        warn!("DIMM param {}: {} ohm not supported", param.name(), ohms);
        return Err(MrcError::ValueNotSupported);
    };
    let (_, shift, width) = field(param);
    Ok(insert_field(mr_value, shift, width, code))
}

/// Ohm value of `param` currently encoded in `mr_value`.
///
/// # Errors
///
/// [`MrcError::InvalidEncoding`] for a reserved code.
pub fn dimm_param_value(mr_value: u16, param: DimmOptParam) -> Result<u16> {
    let (_, shift, width) = field(param);
    let code = usize::from(extract_field(mr_value, shift, width));
    let value = match param {
        DimmOptParam::Ron => code.checked_sub(1).and_then(|i| RON_VALUES.get(i)),
        _ => ODT_VALUES.get(code),
    };
    value.copied().ok_or(MrcError::InvalidEncoding)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolve_gives_slot_and_mr_number() {
        let r = resolve_dimm_opt_param(DimmOptParam::OdtNom);
        assert_eq!(r.address, MR41);
        assert_eq!(resolve_dimm_opt_param(DimmOptParam::OdtPark).address, MR11);
    }

    #[test]
    fn every_param_resolves_to_a_cached_slot() {
        for param in [DimmOptParam::Ron, DimmOptParam::OdtWr, DimmOptParam::OdtNom, DimmOptParam::OdtPark] {
            let r = resolve_dimm_opt_param(param);
            assert_eq!(MR_INIT_LIST.get(r.index), Some(&r.address), "{}", param.name());
            assert_eq!(crate::mode_register::mr_slot(r.address), Some(r.index));
        }
    }

    #[test]
    fn odt_values_distinct() {
        let values = dimm_opt_param_values(DimmOptParam::OdtWr);
        assert!(!values.is_empty());
        for (i, a) in values.iter().enumerate() {
            assert!(values.iter().skip(i + 1).all(|b| b != a));
        }
    }

    #[test]
    fn set_ron_keeps_other_bits() {
        // bank org 10 in OP[4:3]
        let v = set_dimm_param_value(0b0001_0000, DimmOptParam::Ron, 80).unwrap();
        assert_eq!(v, 0b0001_0011);
        assert_eq!(dimm_param_value(v, DimmOptParam::Ron).unwrap(), 80);
    }

    #[test]
    fn set_odt_wr() {
        let v = set_dimm_param_value(0b0011_0000, DimmOptParam::OdtWr, 48).unwrap();
        assert_eq!(v, 0b0011_0101);
        assert_eq!(dimm_param_value(v, DimmOptParam::OdtWr).unwrap(), 48);
        assert_eq!(dimm_param_value(v, DimmOptParam::OdtPark).unwrap(), 80);
    }

    #[test]
    fn unsupported_value_and_param() {
        assert_eq!(
            set_dimm_param_value(0, DimmOptParam::OdtWr, 50),
            Err(MrcError::ValueNotSupported)
        );
        // Ron has no "off" setting
        assert_eq!(
            set_dimm_param_value(0, DimmOptParam::Ron, ODT_OFF),
            Err(MrcError::ValueNotSupported)
        );
        assert_eq!(
            set_dimm_param_value(0, DimmOptParam::OdtNom, 60),
            Err(MrcError::UnsupportedParameter)
        );
    }

    #[test]
    fn reserved_ron_code_rejected() {
        assert_eq!(dimm_param_value(0, DimmOptParam::Ron), Err(MrcError::InvalidEncoding));
        assert_eq!(dimm_param_value(7, DimmOptParam::Ron), Err(MrcError::InvalidEncoding));
    }
}
