//! Builds the unsigned `rDE` tree for a factura electrónica.
//!
//! The tree is emitted directly in schema 150 order and without any
//! whitespace, so a freshly built document is already normalized. `DE@Id`
//! is the CDC computed from the same fields, which keeps identifier and
//! content in lockstep.

use chrono::NaiveDateTime;

use crate::domain::cdc::{self, Cdc};
use crate::domain::document::{DocumentFields, Item, PaymentCondition, VatRate};
use crate::domain::types::SchemaVersion;
use crate::domain::xml::{Element, QName};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Build `rDE` and return it with its CDC.
///
/// `signed_at` becomes `dFecFirma`; signing must follow promptly, the
/// authority rejects signature dates far from the reception time.
pub fn build_rde(
    fields: &DocumentFields,
    signed_at: NaiveDateTime,
    logger: &Logger,
) -> SifenResult<(Element, Cdc)> {
    if fields.document_type != 1 {
        return Err(SifenError::InvalidInput(format!(
            "document type {} is not supported; only 1 (factura electrónica)",
            fields.document_type
        )));
    }
    fields.validate()?;
    let cdc = cdc::generate(&fields.cdc_fields())?;

    let mut de = Element::new(&QName::sifen("DE"));
    de.set_attribute("Id", cdc.as_str());
    let de = de
        .child(leaf("dDVId", cdc.check_digit()))
        .child(leaf("dFecFirma", signed_at.format(DATE_TIME_FORMAT)))
        .child(leaf("dSisFact", 1))
        .child(operation(fields))
        .child(timbrado(fields))
        .child(general_data(fields))
        .child(type_specific(fields))
        .child(totals(fields));

    let rde = Element::with_default_namespace(&QName::sifen("rDE"))
        .child(leaf("dVerFor", SchemaVersion::V150.0))
        .child(de);

    logger.info(&format!(
        "built DE {cdc} with {} item(s), total {}",
        fields.items.len(),
        fields.totals().operation_total()
    ));
    Ok((rde, cdc))
}

fn leaf(local: &str, value: impl std::fmt::Display) -> Element {
    Element::text_leaf(&QName::sifen(local), value.to_string())
}

fn group(local: &str) -> Element {
    Element::new(&QName::sifen(local))
}

fn operation(fields: &DocumentFields) -> Element {
    group("gOpeDE")
        .child(leaf("iTipEmi", fields.emission_type))
        .child(leaf(
            "dDesTipEmi",
            if fields.emission_type == 2 { "Contingencia" } else { "Normal" },
        ))
        .child(leaf("dCodSeg", format!("{:09}", fields.security_code)))
}

fn timbrado(fields: &DocumentFields) -> Element {
    group("gTimb")
        .child(leaf("iTiDE", fields.document_type))
        .child(leaf("dDesTiDE", "Factura electrónica"))
        .child(leaf("dNumTim", fields.timbrado.number))
        .child(leaf("dEst", format!("{:03}", fields.establishment)))
        .child(leaf("dPunExp", format!("{:03}", fields.expedition_point)))
        .child(leaf("dNumDoc", format!("{:07}", fields.document_number)))
        .child(leaf("dFeIniT", fields.timbrado.valid_from.format("%Y-%m-%d")))
}

fn general_data(fields: &DocumentFields) -> Element {
    let commercial = group("gOpeCom")
        .child(leaf("iTipTra", fields.transaction_type))
        .child(leaf("dDesTipTra", transaction_description(fields.transaction_type)))
        .child(leaf("iTImp", 1))
        .child(leaf("dDesTImp", "IVA"))
        .child(leaf("cMoneOpe", &fields.currency))
        .child(leaf("dDesMoneOpe", "Guarani"));

    let issuer = &fields.issuer;
    let emitter = group("gEmis")
        .child(leaf("dRucEm", &issuer.ruc))
        .child(leaf("dDVEmi", issuer.dv))
        .child(leaf("iTipCont", issuer.taxpayer_type))
        .child(leaf("dNomEmi", &issuer.name))
        .child(leaf("dDirEmi", &issuer.address))
        .child(leaf("dNumCas", &issuer.house_number))
        .child(leaf("cDepEmi", issuer.department_code))
        .child(leaf("dDesDepEmi", &issuer.department_name))
        .child(leaf("cCiuEmi", issuer.city_code))
        .child(leaf("dDesCiuEmi", &issuer.city_name))
        .child(leaf("dTelEmi", &issuer.phone))
        .child(leaf("dEmailE", &issuer.email))
        .child(
            group("gActEco")
                .child(leaf("cActEco", &issuer.activity_code))
                .child(leaf("dDesActEco", &issuer.activity_description)),
        );

    group("gDatGralOpe")
        .child(leaf(
            "dFeEmiDE",
            fields.emission_timestamp.format(DATE_TIME_FORMAT),
        ))
        .child(commercial)
        .child(emitter)
        .child(receiver(fields))
}

fn receiver(fields: &DocumentFields) -> Element {
    let receiver = &fields.receiver;
    let mut element = group("gDatRec")
        .child(leaf("iNatRec", if receiver.taxpayer { 1 } else { 2 }))
        .child(leaf("iTiOpe", 1))
        .child(leaf("cPaisRec", &receiver.country))
        .child(leaf("dDesPaisRe", country_description(&receiver.country)));

    match (receiver.taxpayer, &receiver.ruc) {
        (true, Some(ruc)) => {
            element.push(leaf("iTiContRec", if ruc.len() >= 8 { 2 } else { 1 }));
            element.push(leaf("dRucRec", ruc));
            element.push(leaf("dDVRec", receiver.dv.unwrap_or_default()));
        }
        _ => {
            // unidentified final consumer
            element.push(leaf("iTipIDRec", 5));
            element.push(leaf("dDTipIDRec", "Innominado"));
            element.push(leaf("dNumIDRec", 0));
        }
    }
    element.child(leaf("dNomRec", &receiver.name))
}

fn type_specific(fields: &DocumentFields) -> Element {
    let totals = fields.totals();
    let mut condition = group("gCamCond");
    match fields.payment {
        PaymentCondition::Cash => {
            condition.push(leaf("iCondOpe", 1));
            condition.push(leaf("dDCondOpe", "Contado"));
            condition.push(
                group("gPaConEIni")
                    .child(leaf("iTiPago", 1))
                    .child(leaf("dDesTiPag", "Efectivo"))
                    .child(leaf("dMonTiPag", totals.operation_total()))
                    .child(leaf("cMoneTiPag", &fields.currency))
                    .child(leaf("dDMoneTiPag", "Guarani")),
            );
        }
        PaymentCondition::Credit => {
            condition.push(leaf("iCondOpe", 2));
            condition.push(leaf("dDCondOpe", "Crédito"));
        }
    }

    let mut element = group("gDtipDE")
        .child(
            group("gCamFE")
                .child(leaf("iIndPres", 1))
                .child(leaf("dDesIndPres", "Operación presencial")),
        )
        .child(condition);
    for item in &fields.items {
        element.push(line_item(item));
    }
    element
}

fn line_item(item: &Item) -> Element {
    let total = item.total();
    let value = group("gValorItem")
        .child(leaf("dPUniProSer", item.unit_price))
        .child(leaf("dTotBruOpeItem", total))
        .child(
            group("gValorRestaItem")
                .child(leaf("dDescItem", 0))
                .child(leaf("dTotOpeItem", total)),
        );

    let vat = item.vat();
    let (affected, description, proportion, base, exempt) = match item.vat_rate {
        VatRate::Exempt => (3, "Exento", 0, 0, total),
        VatRate::Five | VatRate::Ten => (1, "Gravado IVA", 100, total - vat, 0),
    };
    let tax = group("gCamIVA")
        .child(leaf("iAfecIVA", affected))
        .child(leaf("dDesAfecIVA", description))
        .child(leaf("dPropIVA", proportion))
        .child(leaf("dTasaIVA", item.vat_rate.percent()))
        .child(leaf("dBasGravIVA", base))
        .child(leaf("dLiqIVAItem", vat))
        .child(leaf("dBasExe", exempt));

    group("gCamItem")
        .child(leaf("dCodInt", &item.code))
        .child(leaf("dDesProSer", &item.description))
        .child(leaf("cUniMed", item.unit))
        .child(leaf("dDesUniMed", unit_description(item.unit)))
        .child(leaf("dCantProSer", format_quantity(item.quantity)))
        .child(value)
        .child(tax)
}

fn totals(fields: &DocumentFields) -> Element {
    let totals = fields.totals();
    group("gTotSub")
        .child(leaf("dSubExe", totals.exempt))
        .child(leaf("dSub5", totals.subtotal_5))
        .child(leaf("dSub10", totals.subtotal_10))
        .child(leaf("dTotOpe", totals.operation_total()))
        .child(leaf("dTotDesc", 0))
        .child(leaf("dTotDescGlotem", 0))
        .child(leaf("dTotAntItem", 0))
        .child(leaf("dTotAnt", 0))
        .child(leaf("dPorcDescTotal", 0))
        .child(leaf("dDescTotal", 0))
        .child(leaf("dAnticipo", 0))
        .child(leaf("dRedon", 0))
        .child(leaf("dTotGralOpe", totals.operation_total()))
        .child(leaf("dIVA5", totals.vat_5))
        .child(leaf("dIVA10", totals.vat_10))
        .child(leaf("dTotIVA", totals.vat_total()))
        .child(leaf("dBaseGrav5", totals.taxable_5()))
        .child(leaf("dBaseGrav10", totals.taxable_10()))
        .child(leaf("dTBasGraIVA", totals.taxable_5() + totals.taxable_10()))
}

fn transaction_description(code: u8) -> &'static str {
    match code {
        1 => "Venta de mercadería",
        2 => "Prestación de servicios",
        3 => "Mixto",
        _ => "Otro",
    }
}

fn country_description(code: &str) -> &str {
    match code {
        "PRY" => "Paraguay",
        "ARG" => "Argentina",
        "BRA" => "Brasil",
        "BOL" => "Bolivia",
        "URY" => "Uruguay",
        other => other,
    }
}

fn unit_description(code: u16) -> &'static str {
    match code {
        77 => "UNI",
        83 => "kg",
        87 => "m",
        89 => "l",
        _ => "UNI",
    }
}

/// Whole quantities are written without decimals, fractions with up to four.
fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        let text = format!("{quantity:.4}");
        text.trim_end_matches('0').to_string()
    }
}
