//! Canonical child ordering, keyed by parent element and schema version.
//!
//! The validator rejects any deviation from the XSD sequence order, and the
//! published documentation does not always match what it enforces. The table
//! below is what the v150 validator accepts. Extra entries or whole new
//! versions can be registered at runtime; lookups fall back to the closest
//! lower version that knows the parent.

use crate::domain::constants::DSIG_NS;
use crate::domain::types::SchemaVersion;
use crate::domain::xml::QName;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct OrderingTable {
    versions: BTreeMap<SchemaVersion, HashMap<QName, Vec<QName>>>,
}

impl OrderingTable {
    /// Empty table; see [`OrderingTable::seeded`] for the built-in orders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with the schema 150 sequences.
    #[must_use]
    pub fn seeded() -> Self {
        let mut table = Self::new();
        for (parent, children) in V150 {
            let order = children
                .iter()
                .map(|local| {
                    if *local == "Signature" {
                        QName::dsig(*local)
                    } else {
                        QName::sifen(*local)
                    }
                })
                .collect();
            table.register(SchemaVersion::V150, QName::sifen(*parent), order);
        }
        table
    }

    /// Add or replace the order for `parent` under `version`.
    pub fn register(&mut self, version: SchemaVersion, parent: QName, order: Vec<QName>) {
        self.versions
            .entry(version)
            .or_default()
            .insert(parent, order);
    }

    /// Order for `parent`, falling back to the nearest lower version.
    #[must_use]
    pub fn lookup(&self, version: SchemaVersion, parent: &QName) -> Option<&[QName]> {
        self.versions
            .range(..=version)
            .rev()
            .find_map(|(_, parents)| parents.get(parent))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn versions(&self) -> Vec<SchemaVersion> {
        self.versions.keys().copied().collect()
    }

    /// Number of parents with a known order for this exact version.
    #[must_use]
    pub fn len(&self, version: SchemaVersion) -> usize {
        self.versions.get(&version).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.values().all(HashMap::is_empty)
    }
}

/// Schema 150 sequences. `Signature` is the only DSig-namespace entry.
const V150: &[(&str, &[&str])] = &[
    ("rDE", &["dVerFor", "DE", "Signature", "gCamFuFD"]),
    (
        "DE",
        &[
            "dDVId", "dFecFirma", "dSisFact", "gOpeDE", "gTimb", "gDatGralOpe", "gDtipDE",
            "gTotSub", "gCamGen", "gCamDEAsoc",
        ],
    ),
    ("gOpeDE", &["iTipEmi", "dDesTipEmi", "dCodSeg", "dInfoEmi", "dInfoFisc"]),
    (
        "gTimb",
        &[
            "iTiDE", "dDesTiDE", "dNumTim", "dEst", "dPunExp", "dNumDoc", "dSerieNum",
            "dFeIniT",
        ],
    ),
    ("gDatGralOpe", &["dFeEmiDE", "gOpeCom", "gEmis", "gDatRec"]),
    (
        "gOpeCom",
        &[
            "iTipTra", "dDesTipTra", "iTImp", "dDesTImp", "cMoneOpe", "dDesMoneOpe",
            "dCondTiCam", "dTiCam", "iCondAnt", "dDesCondAnt",
        ],
    ),
    (
        "gEmis",
        &[
            "dRucEm", "dDVEmi", "iTipCont", "cTipReg", "dNomEmi", "dNomFanEmi", "dDirEmi",
            "dNumCas", "dCompDir1", "dCompDir2", "cDepEmi", "dDesDepEmi", "cDisEmi",
            "dDesDisEmi", "cCiuEmi", "dDesCiuEmi", "dTelEmi", "dEmailE", "dDenSuc", "gActEco",
            "gRespDE",
        ],
    ),
    ("gActEco", &["cActEco", "dDesActEco"]),
    (
        "gDatRec",
        &[
            "iNatRec", "iTiOpe", "cPaisRec", "dDesPaisRe", "iTiContRec", "dRucRec", "dDVRec",
            "iTipIDRec", "dDTipIDRec", "dNumIDRec", "dNomRec", "dNomFanRec", "dDirRec",
            "dNumCasRec", "cDepRec", "dDesDepRec", "cDisRec", "dDesDisRec", "cCiuRec",
            "dDesCiuRec", "dTelRec", "dCelRec", "dEmailRec", "dCodCliente",
        ],
    ),
    (
        "gDtipDE",
        &[
            "gCamFE", "gCamAE", "gCamNCDE", "gCamNRE", "gCamCond", "gCamItem", "gCamEsp",
            "gTransp",
        ],
    ),
    ("gCamFE", &["iIndPres", "dDesIndPres", "dFecEmNR", "gCompPub"]),
    ("gCamCond", &["iCondOpe", "dDCondOpe", "gPaConEIni", "gPagCred"]),
    (
        "gPaConEIni",
        &[
            "iTiPago", "dDesTiPag", "dMonTiPag", "cMoneTiPag", "dDMoneTiPag", "dTiCamTiPag",
            "gPagTarCD", "gPagCheq",
        ],
    ),
    (
        "gCamItem",
        &[
            "dCodInt", "dParAranc", "dNCM", "dDncpG", "dDncpE", "dGtin", "dGtinPq",
            "dDesProSer", "cUniMed", "dDesUniMed", "dCantProSer", "cPaisOrig", "dDesPaisOrig",
            "dInfItem", "cRelMerc", "dDesRelMerc", "dCanQuiMer", "dPorQuiMer", "dCDCAnticipo",
            "gValorItem", "gCamIVA", "gRasMerc", "gVehNuevo",
        ],
    ),
    (
        "gValorItem",
        &["dPUniProSer", "dTiCamIt", "dTotBruOpeItem", "gValorRestaItem"],
    ),
    (
        "gValorRestaItem",
        &[
            "dDescItem", "dPorcDesIt", "dDescGloItem", "dAntPreUniIt", "dAntGloPreUniIt",
            "dTotOpeItem", "dTotOpeGs",
        ],
    ),
    (
        "gCamIVA",
        &[
            "iAfecIVA", "dDesAfecIVA", "dPropIVA", "dTasaIVA", "dBasGravIVA", "dLiqIVAItem",
            "dBasExe",
        ],
    ),
    (
        "gTotSub",
        &[
            "dSubExe", "dSubExo", "dSub5", "dSub10", "dTotOpe", "dTotDesc", "dTotDescGlotem",
            "dTotAntItem", "dTotAnt", "dPorcDescTotal", "dDescTotal", "dAnticipo", "dRedon",
            "dComi", "dTotGralOpe", "dIVA5", "dIVA10", "dLiqTotIVA5", "dLiqTotIVA10",
            "dIVAComi", "dTotIVA", "dBaseGrav5", "dBaseGrav10", "dTBasGraIVA", "dTotalGs",
        ],
    ),
];

/// Whether `name` is the DSig `Signature` element.
#[must_use]
pub fn is_signature(name: &QName) -> bool {
    name.local == "Signature" && name.namespace.as_deref() == Some(DSIG_NS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_table_knows_core_groups() {
        let table = OrderingTable::seeded();
        let gtimb = table
            .lookup(SchemaVersion::V150, &QName::sifen("gTimb"))
            .unwrap();
        assert_eq!(gtimb[1], QName::sifen("dDesTiDE"));
        assert_eq!(gtimb[2], QName::sifen("dNumTim"));
        let rde = table.lookup(SchemaVersion::V150, &QName::sifen("rDE")).unwrap();
        assert!(is_signature(&rde[2]));
        assert!(table.len(SchemaVersion::V150) >= 16);
    }

    #[test]
    fn lookup_falls_back_to_lower_version() {
        let mut table = OrderingTable::seeded();
        let newer = SchemaVersion(151);
        table.register(
            newer,
            QName::sifen("gOpeDE"),
            vec![QName::sifen("iTipEmi"), QName::sifen("dCodSeg")],
        );
        assert_eq!(
            table.lookup(newer, &QName::sifen("gOpeDE")).unwrap().len(),
            2
        );
        // not overridden in 151, inherited from 150
        assert!(table.lookup(newer, &QName::sifen("gTimb")).is_some());
        assert!(table
            .lookup(SchemaVersion(149), &QName::sifen("gTimb"))
            .is_none());
    }

    #[test]
    fn matching_is_namespace_aware() {
        let table = OrderingTable::seeded();
        assert!(table
            .lookup(SchemaVersion::V150, &QName::new(None, "gTimb"))
            .is_none());
    }
}
