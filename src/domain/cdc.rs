//! CDC (Código de Control) engine.
//!
//! A CDC is 44 digits: a fixed-order 43-digit payload built from the
//! document's identifying fields, followed by a mod-11 check digit. The check
//! digit is a pure function of the payload, so the same fields always yield
//! the same code.

use crate::domain::constants::{CDC_LEN, CDC_PAYLOAD_LEN, CDC_WEIGHTS};
use crate::infra::error::{SifenError, SifenResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pre-normalized fields contributing to the CDC payload.
///
/// Widths are enforced by [`CdcFields::payload`]; values are zero-padded on
/// the left and rejected if they overflow their slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdcFields {
    /// Document type code (`iTiDE`), 2 digits
    pub document_type: u8,
    /// Issuer RUC, digits only, up to 8
    pub ruc: String,
    /// RUC check digit (`dDVEmi`)
    pub ruc_dv: u8,
    /// Establishment (`dEst`), 3 digits
    pub establishment: u16,
    /// Expedition point (`dPunExp`), 3 digits
    pub expedition_point: u16,
    /// Sequential document number (`dNumDoc`), 7 digits
    pub document_number: u32,
    /// Taxpayer type (`iTipCont`): 1 physical, 2 juridical
    pub taxpayer_type: u8,
    /// Emission date as `YYYYMMDD`
    pub emission_date: String,
    /// Emission type (`iTipEmi`): 1 normal, 2 contingency
    pub emission_type: u8,
    /// Security code (`dCodSeg`), 9 digits
    pub security_code: u32,
}

impl CdcFields {
    /// Concatenate the fields into the 43-digit payload.
    pub fn payload(&self) -> SifenResult<String> {
        if self.ruc.is_empty() || !self.ruc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SifenError::CdcFormat(format!(
                "RUC must be digits only: '{}'",
                self.ruc
            )));
        }
        if self.emission_date.len() != 8 || !self.emission_date.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(SifenError::CdcFormat(format!(
                "emission date must be YYYYMMDD: '{}'",
                self.emission_date
            )));
        }

        let payload = format!(
            "{}{}{}{}{}{}{}{}{}{}",
            pad(u64::from(self.document_type), 2, "document type")?,
            pad_str(&self.ruc, 8, "RUC")?,
            pad(u64::from(self.ruc_dv), 1, "RUC check digit")?,
            pad(u64::from(self.establishment), 3, "establishment")?,
            pad(u64::from(self.expedition_point), 3, "expedition point")?,
            pad(u64::from(self.document_number), 7, "document number")?,
            pad(u64::from(self.taxpayer_type), 1, "taxpayer type")?,
            self.emission_date,
            pad(u64::from(self.emission_type), 1, "emission type")?,
            pad(u64::from(self.security_code), 9, "security code")?,
        );
        ensure_payload(&payload)?;
        Ok(payload)
    }
}

fn pad(value: u64, width: usize, field: &str) -> SifenResult<String> {
    let text = format!("{value:0width$}");
    if text.len() > width {
        return Err(SifenError::CdcFormat(format!(
            "{field} {value} does not fit in {width} digits"
        )));
    }
    Ok(text)
}

fn pad_str(value: &str, width: usize, field: &str) -> SifenResult<String> {
    if value.len() > width {
        return Err(SifenError::CdcFormat(format!(
            "{field} '{value}' does not fit in {width} digits"
        )));
    }
    Ok(format!("{value:0>width$}"))
}

fn ensure_payload(payload: &str) -> SifenResult<()> {
    if payload.len() != CDC_PAYLOAD_LEN || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SifenError::CdcFormat(format!(
            "payload must be exactly {CDC_PAYLOAD_LEN} digits, got '{payload}' ({} chars)",
            payload.len()
        )));
    }
    Ok(())
}

/// Mod-11 check digit of a 43-digit payload.
///
/// Digits are weighted right-to-left with the cycle 2..=9; `11 - (sum % 11)`
/// maps 11 to 0 and 10 to 1.
pub fn check_digit(payload: &str) -> SifenResult<u8> {
    ensure_payload(payload)?;
    let sum: u32 = payload
        .bytes()
        .rev()
        .zip(CDC_WEIGHTS.iter().cycle())
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();
    let digit = match 11 - (sum % 11) {
        11 => 0,
        10 => 1,
        d => d,
    };
    // digit is always 0..=9 here
    Ok(u8::try_from(digit).unwrap_or(0))
}

/// Build the full 44-digit code from its contributing fields.
pub fn generate(fields: &CdcFields) -> SifenResult<Cdc> {
    let payload = fields.payload()?;
    let digit = check_digit(&payload)?;
    Ok(Cdc(format!("{payload}{digit}")))
}

/// Outcome of checking a 44-digit code against its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub declared_digit: u8,
    pub computed_digit: u8,
}

/// Compare the declared check digit with the one computed from the payload.
pub fn validate(code: &str) -> SifenResult<ValidationResult> {
    let code = code.trim();
    if code.len() != CDC_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SifenError::CdcFormat(format!(
            "CDC must be exactly {CDC_LEN} digits, got {} chars",
            code.len()
        )));
    }
    let (payload, declared) = code.split_at(CDC_PAYLOAD_LEN);
    let declared_digit = declared.as_bytes()[0] - b'0';
    let computed_digit = check_digit(payload)?;
    Ok(ValidationResult {
        ok: declared_digit == computed_digit,
        declared_digit,
        computed_digit,
    })
}

/// Return the code with a correct check digit.
///
/// Accepts either the 43-digit payload (digit appended) or a 44-digit code
/// (last digit replaced). The payload is never altered.
pub fn fix(code: &str) -> SifenResult<Cdc> {
    let code = code.trim();
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SifenError::CdcFormat(format!("CDC must be digits only: '{code}'")));
    }
    let payload = match code.len() {
        CDC_PAYLOAD_LEN => code,
        CDC_LEN => &code[..CDC_PAYLOAD_LEN],
        other => {
            return Err(SifenError::CdcFormat(format!(
                "expected {CDC_PAYLOAD_LEN} or {CDC_LEN} digits, got {other}"
            )))
        }
    };
    let digit = check_digit(payload)?;
    Ok(Cdc(format!("{payload}{digit}")))
}

/// A validated 44-digit CDC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cdc(String);

impl Cdc {
    /// Parse a code, requiring a correct check digit.
    pub fn parse(code: &str) -> SifenResult<Self> {
        let result = validate(code)?;
        if !result.ok {
            return Err(SifenError::CdcFormat(format!(
                "check digit mismatch: declared {}, computed {}",
                result.declared_digit, result.computed_digit
            )));
        }
        Ok(Self(code.trim().to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn payload(&self) -> &str {
        &self.0[..CDC_PAYLOAD_LEN]
    }

    #[must_use]
    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[CDC_PAYLOAD_LEN] - b'0'
    }
}

impl TryFrom<String> for Cdc {
    type Error = SifenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cdc> for String {
    fn from(value: Cdc) -> Self {
        value.0
    }
}

impl FromStr for Cdc {
    type Err = SifenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Cdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "0104554737800100100000011202512301123456789";

    fn sample_fields() -> CdcFields {
        CdcFields {
            document_type: 1,
            ruc: "4554737".to_string(),
            ruc_dv: 8,
            establishment: 1,
            expedition_point: 1,
            document_number: 1,
            taxpayer_type: 1,
            emission_date: "20251230".to_string(),
            emission_type: 1,
            security_code: 123_456_789,
        }
    }

    #[test]
    fn payload_layout_matches_reference() {
        assert_eq!(sample_fields().payload().unwrap(), PAYLOAD);
    }

    #[test]
    fn reference_check_digit() {
        assert_eq!(check_digit(PAYLOAD).unwrap(), 5);
        let cdc = generate(&sample_fields()).unwrap();
        assert_eq!(cdc.as_str(), format!("{PAYLOAD}5"));
        assert_eq!(cdc.check_digit(), 5);
    }

    #[test]
    fn fix_replaces_wrong_digit() {
        let fixed = fix(&format!("{PAYLOAD}2")).unwrap();
        assert_eq!(fixed.as_str(), format!("{PAYLOAD}5"));
        assert_eq!(fix(PAYLOAD).unwrap(), fixed);
    }

    #[test]
    fn validate_reports_both_digits() {
        let result = validate(&format!("{PAYLOAD}2")).unwrap();
        assert!(!result.ok);
        assert_eq!(result.declared_digit, 2);
        assert_eq!(result.computed_digit, 5);
    }

    #[test]
    fn wrong_lengths_are_format_errors() {
        assert!(matches!(check_digit("123"), Err(SifenError::CdcFormat(_))));
        assert!(matches!(validate("12345"), Err(SifenError::CdcFormat(_))));
        assert!(matches!(fix("1".repeat(45).as_str()), Err(SifenError::CdcFormat(_))));
        let mut fields = sample_fields();
        fields.document_number = 12_345_678;
        assert!(matches!(fields.payload(), Err(SifenError::CdcFormat(_))));
    }

    #[test]
    fn non_digit_payload_rejected() {
        let bad = format!("{}X", &PAYLOAD[..42]);
        assert!(check_digit(&bad).is_err());
    }
}
