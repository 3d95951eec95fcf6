//! Normalized field mapping for one electronic document.
//!
//! This is the contract with upstream adapters: they hand over already
//! normalized values (digits-only RUC, integer guaraní amounts, known codes)
//! and get back a signed document and its CDC. Totals are never supplied;
//! they are derived from the items.

use crate::domain::cdc::CdcFields;
use crate::infra::error::{SifenError, SifenResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFields {
    /// `iTiDE`: 1 = factura electrónica
    pub document_type: u8,
    /// `iTipEmi`: 1 = normal, 2 = contingency
    #[serde(default = "default_one")]
    pub emission_type: u8,
    /// `dCodSeg`, up to 9 digits
    pub security_code: u32,
    pub establishment: u16,
    pub expedition_point: u16,
    pub document_number: u32,
    pub emission_timestamp: NaiveDateTime,
    /// `iTipTra`: 1 = sale of goods, 2 = services, 3 = mixed
    #[serde(default = "default_one")]
    pub transaction_type: u8,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub issuer: Issuer,
    pub timbrado: Timbrado,
    pub receiver: Receiver,
    pub items: Vec<Item>,
    #[serde(default)]
    pub payment: PaymentCondition,
}

fn default_one() -> u8 {
    1
}

fn default_currency() -> String {
    "PYG".to_string()
}

fn default_country() -> String {
    "PRY".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub ruc: String,
    pub dv: u8,
    pub name: String,
    pub address: String,
    pub house_number: String,
    pub department_code: u16,
    pub department_name: String,
    pub city_code: u32,
    pub city_name: String,
    pub phone: String,
    pub email: String,
    pub activity_code: String,
    pub activity_description: String,
    /// `iTipCont`: 1 = physical person, 2 = juridical person
    pub taxpayer_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timbrado {
    pub number: u32,
    pub valid_from: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    /// Receiver is a registered taxpayer (`iNatRec` 1) with a RUC
    pub taxpayer: bool,
    pub ruc: Option<String>,
    pub dv: Option<u8>,
    pub name: String,
    #[serde(default = "default_country")]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub code: String,
    pub description: String,
    /// `cUniMed`, 77 = unit
    #[serde(default = "default_unit")]
    pub unit: u16,
    pub quantity: f64,
    /// VAT-included unit price in guaraníes
    pub unit_price: i64,
    pub vat_rate: VatRate,
}

fn default_unit() -> u16 {
    77
}

impl Item {
    /// VAT-included line total, rounded to whole guaraníes.
    #[must_use]
    pub fn total(&self) -> i64 {
        (self.quantity * self.unit_price as f64).round() as i64
    }

    /// VAT contained in the line total.
    #[must_use]
    pub fn vat(&self) -> i64 {
        self.vat_rate.vat_included(self.total())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VatRate {
    Exempt,
    Five,
    Ten,
}

impl VatRate {
    #[must_use]
    pub fn percent(&self) -> u8 {
        match self {
            VatRate::Exempt => 0,
            VatRate::Five => 5,
            VatRate::Ten => 10,
        }
    }

    /// VAT contained in a VAT-included amount: total/11 at 10%, total/21 at 5%.
    #[must_use]
    pub fn vat_included(&self, total: i64) -> i64 {
        match self {
            VatRate::Exempt => 0,
            VatRate::Five => div_round(total, 21),
            VatRate::Ten => div_round(total, 11),
        }
    }
}

fn div_round(value: i64, divisor: i64) -> i64 {
    (value + divisor / 2).div_euclid(divisor)
}

impl TryFrom<u8> for VatRate {
    type Error = SifenError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VatRate::Exempt),
            5 => Ok(VatRate::Five),
            10 => Ok(VatRate::Ten),
            other => Err(SifenError::InvalidInput(format!(
                "VAT rate must be 0, 5 or 10, got {other}"
            ))),
        }
    }
}

impl From<VatRate> for u8 {
    fn from(value: VatRate) -> Self {
        value.percent()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCondition {
    #[default]
    Cash,
    Credit,
}

/// Document totals derived from the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub exempt: i64,
    pub subtotal_5: i64,
    pub subtotal_10: i64,
    pub vat_5: i64,
    pub vat_10: i64,
}

impl Totals {
    #[must_use]
    pub fn from_items(items: &[Item]) -> Self {
        let mut totals = Totals::default();
        for item in items {
            let total = item.total();
            match item.vat_rate {
                VatRate::Exempt => totals.exempt += total,
                VatRate::Five => {
                    totals.subtotal_5 += total;
                    totals.vat_5 += item.vat();
                }
                VatRate::Ten => {
                    totals.subtotal_10 += total;
                    totals.vat_10 += item.vat();
                }
            }
        }
        totals
    }

    #[must_use]
    pub fn operation_total(&self) -> i64 {
        self.exempt + self.subtotal_5 + self.subtotal_10
    }

    #[must_use]
    pub fn vat_total(&self) -> i64 {
        self.vat_5 + self.vat_10
    }

    #[must_use]
    pub fn taxable_5(&self) -> i64 {
        self.subtotal_5 - self.vat_5
    }

    #[must_use]
    pub fn taxable_10(&self) -> i64 {
        self.subtotal_10 - self.vat_10
    }
}

impl DocumentFields {
    /// Reject values that cannot produce a well-formed document.
    pub fn validate(&self) -> SifenResult<()> {
        if self.items.is_empty() {
            return Err(SifenError::InvalidInput(
                "document must have at least one item".to_string(),
            ));
        }
        if let Some(bad) = self.items.iter().find(|i| i.quantity <= 0.0 || i.unit_price < 0) {
            return Err(SifenError::InvalidInput(format!(
                "item '{}' has a non-positive quantity or negative price",
                bad.code
            )));
        }
        if self.receiver.taxpayer && self.receiver.ruc.is_none() {
            return Err(SifenError::InvalidInput(
                "taxpayer receiver requires a RUC".to_string(),
            ));
        }
        if self.currency != "PYG" {
            return Err(SifenError::InvalidInput(format!(
                "only PYG operations are supported, got {}",
                self.currency
            )));
        }
        self.cdc_fields().payload().map(|_| ())
    }

    #[must_use]
    pub fn cdc_fields(&self) -> CdcFields {
        CdcFields {
            document_type: self.document_type,
            ruc: self.issuer.ruc.clone(),
            ruc_dv: self.issuer.dv,
            establishment: self.establishment,
            expedition_point: self.expedition_point,
            document_number: self.document_number,
            taxpayer_type: self.issuer.taxpayer_type,
            emission_date: self.emission_timestamp.format("%Y%m%d").to_string(),
            emission_type: self.emission_type,
            security_code: self.security_code,
        }
    }

    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::from_items(&self.items)
    }
}
