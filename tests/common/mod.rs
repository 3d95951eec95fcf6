//! Shared helpers for the integration tests.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

pub mod pki;
pub mod scripted;
pub mod test_env;

use sifen_signer::DocumentFields;

/// Sample factura: two taxed items and one exempt, issued by RUC 4554737-8.
/// Its CDC is `01045547378001001000000112025123011234567895`.
pub const SAMPLE_FIELDS_JSON: &str = r#"{
    "document_type": 1,
    "security_code": 123456789,
    "establishment": 1,
    "expedition_point": 1,
    "document_number": 1,
    "emission_timestamp": "2025-12-30T10:15:00",
    "issuer": {
        "ruc": "4554737", "dv": 8, "name": "Comercial Ejemplo",
        "address": "Avda. Mcal. López", "house_number": "1234",
        "department_code": 1, "department_name": "CAPITAL",
        "city_code": 1, "city_name": "ASUNCION (DISTRITO)",
        "phone": "021000000", "email": "ventas@example.com.py",
        "activity_code": "47111",
        "activity_description": "Comercio al por menor",
        "taxpayer_type": 1
    },
    "timbrado": { "number": 12345678, "valid_from": "2025-01-01" },
    "receiver": { "taxpayer": true, "ruc": "80012345", "dv": 6, "name": "Cliente SA" },
    "items": [
        { "code": "A1", "description": "Producto", "quantity": 2, "unit_price": 55000, "vat_rate": 10 },
        { "code": "B2", "description": "Libro", "quantity": 1, "unit_price": 21000, "vat_rate": 5 },
        { "code": "C3", "description": "Exento", "quantity": 1, "unit_price": 5000, "vat_rate": 0 }
    ]
}"#;

pub const SAMPLE_CDC: &str = "01045547378001001000000112025123011234567895";

pub fn sample_fields() -> DocumentFields {
    serde_json::from_str(SAMPLE_FIELDS_JSON).expect("sample fields parse")
}

pub fn signed_at() -> chrono::NaiveDateTime {
    chrono::NaiveDateTime::parse_from_str("2025-12-30T10:16:00", "%Y-%m-%dT%H:%M:%S")
        .expect("valid timestamp")
}
