//! Brand domain knowledge
//!
//! Static per-brand data: which manuals cover which equipment, the thematic
//! expansions applied to retrieval queries and the equipment vocabulary used
//! to tell documents apart.

use crate::entity::KnownContext;
use crate::search::display_name;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

/// Manuals and related hardware for one equipment family
#[derive(Debug)]
pub struct KnowledgeEntry {
    pub key: &'static str,
    pub docs: &'static [&'static str],
    pub boards: &'static [&'static str],
    pub drives: &'static [&'static str],
    pub related: &'static [&'static str],
}

const fn entry(
    key: &'static str,
    docs: &'static [&'static str],
    boards: &'static [&'static str],
    drives: &'static [&'static str],
    related: &'static [&'static str],
) -> KnowledgeEntry {
    KnowledgeEntry {
        key,
        docs,
        boards,
        drives,
        related,
    }
}

/// Query terms appended when a theme fires
pub struct ExpansionRule {
    pub trigger: Regex,
    pub terms: &'static [&'static str],
}

/// Everything brand-specific the engine knows
pub struct DomainProfile {
    pub brand: &'static str,
    pub knowledge: &'static [KnowledgeEntry],
    pub expansions: Vec<ExpansionRule>,
    pub equipment_vocabulary: &'static [&'static str],
}

static OTIS_KNOWLEDGE: &[KnowledgeEntry] = &[
    entry(
        "gen2",
        &[
            "Manual GEN2.pdf",
            "Gen2 Comfort - Manual de serviços-1.pdf",
            "Manual Otis Gen2 Confort-1.pdf",
            "MAG GEN2-1.pdf",
            "Treinamento do produto Gen2C.pdf",
            "Manual  GEN2 Resgate.pdf",
            "DIAGRAMA GEN2-1.pdf",
            "Diagrama Gen2 Confort Baa21000j-1.pdf",
            "GEN 2 esquema.pdf",
            "GEN 2 MCS 220C GAA21000CJ.pdf",
        ],
        &["GECB", "LCB2", "MCS220"],
        &["OVF20", "LVA"],
        &[],
    ),
    entry(
        "ovf10",
        &[
            "Manual CVF - OVF10.pdf",
            "Calibração do OVF10.pdf",
            "ADV DP COM OVF10 BAA21340K.pdf",
            "OVF10 por WEG CFW09.pdf",
        ],
        &["LCB1", "LCBI", "LCB2"],
        &[],
        &["ADV-210", "CVF"],
    ),
    entry(
        "ovf20",
        &[
            "Manual LVF - OVF 20.pdf",
            "LFV OVF20 MNUAL DE AJUSTE.pdf",
            "LCB2 OVF20 VF2 BAA21290AX.pdf",
            "ADV 210 com OVF20 (BAA21340R).pdf",
        ],
        &["LCB2"],
        &[],
        &[],
    ),
    entry(
        "lcb1",
        &[
            "DIAGRAMA DE LCB1 PARA LCB2.pdf",
            "DIAGRAMA TROCA DE LCB1 POR LCB2.pdf",
            "LCB1 POR LCB2 SUBSTITUICAO ATC 035.pdf",
            "Diagrama ADV 210 LCBI.pdf",
            "ADV210DP - LCBI.pdf",
        ],
        &[],
        &[],
        &["LCB2"],
    ),
    entry(
        "lcb2",
        &[
            "LCB2 Resumo.pdf",
            "WEG LCB2.pdf",
            "Manual URM LCB2.pdf",
            "LCB2 OVF20 VF2 BAA21290AX.pdf",
        ],
        &[],
        &["OVF20", "CFW09", "CFW11"],
        &[],
    ),
    entry(
        "lcbii",
        &[
            "LCBII NOVA-2.pdf",
            "Guia URM LCB II.pdf",
            "VW2 CFW09 com LCBll-1.pdf",
            "Man CFW09 com LCBII.pdf",
            "BAA21230AG_ADVDP LCBII.pdf",
        ],
        &[],
        &["CFW09", "VW2"],
        &[],
    ),
    entry(
        "rcb2",
        &[
            "RCB2 Manual de Ajuste.pdf",
            "GUIA DE USO DA URM – RCB 2.PDF-3.pdf",
            "Lista de IO RCB2 JAA30171AAA.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "gecb",
        &[
            "Manual GECB gen2-1.pdf",
            "GECB+reference+2007.pdf",
            "MANUAL GECB Guia de uso da URM (GAA30780CAA_Fsd1).pdf",
            "MANUAL CHINES COM GECB-1.pdf",
        ],
        &[],
        &[],
        &["Gen2"],
    ),
    entry(
        "adv210",
        &[
            "ADV210DP - LCBI.pdf",
            "ADVZÃO 210 BOS 9693A.pdf",
            "adv-210 baa21230b.pdf",
            "ADV 210 adevesao.pdf",
            "ADV-210 BOS9693A.pdf",
            "ADV 210 com OVF20 (BAA21340R).pdf",
            "ADV DP COM OVF10 BAA21340K.pdf",
            "Diagrama Controle ADV 210 com OVF10 (BAA21340G).pdf",
        ],
        &["LCBI", "LCB1", "LCB2", "LCBII"],
        &["OVF10", "OVF20"],
        &[],
    ),
    entry(
        "mrl",
        &[
            "mrl.pdf",
            "MRL-W-Malha AbertaServiço[1].pdf",
            "MRL WEG FOD-BA.pdf",
            "Diagrama Controle Otis 2000 VF_MRL (BAA21000B)-1.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "do2000",
        &[
            "DO 2000.pdf",
            "Operador OTIS DO 2000.pdf",
            "Manual Operador DO2000.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "xo508",
        &["Otis+XO+508.pdf", "otis+XO+508+falhas.pdf"],
        &[],
        &[],
        &[],
    ),
    entry("otismatic", &["OTISMATIC.pdf"], &[], &[], &[]),
    entry(
        "miconic_bx",
        &[
            "Esquema Miconic BX.pdf-1.pdf",
            "Manual BX_PT_BR_03.pdf",
            "CONSULTA RÁPIDA_bx-1-1.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry("miconic_lx", &["MANUAL MICONIC LX.pdf"], &[], &[], &[]),
    entry(
        "vw_vw2",
        &[
            "VW1_FOD.pdf",
            "otisVW2 WEG Malha Fechada.pdf",
            "BAA21290BM VW2-2.pdf",
            "BAA21290CC VMW VW2-2.pdf",
        ],
        &[],
        &["CFW09", "WEG"],
        &[],
    ),
    entry(
        "lva_ultra_drive",
        &[
            "Ultra drive lva -1.pdf",
            "manual do Ultra Drive.pdf",
            "Manual de Ajuste LVA-1-3.pdf",
            "GEN2+LVA+BAA21000S-1.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "cfw",
        &[
            "Manual CFW_11 Atualizado revisão 3 (2).pdf",
            "ATC CFW700rev1.pdf",
            "OVF10 por WEG CFW09.pdf",
            "VW2 CFW09 com LCBll-1.pdf",
            "Man CFW09 com LCBII.pdf",
            "Malha Fechada VW2 MW2 cfw09.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "gdcb_regen",
        &[
            "Otis-GDCB+REGEN.pdf",
            "Drive Regenerativo (GDCB - 55661).pdf",
            "BAA21000H_fod (2)_diagrama Regen.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "escada_rolante",
        &[
            "Otis escalera NCE manual portugues-1.pdf",
            "Manual Escada Rolante NCE Corrimão.pdf",
            "Otis escaleras Xizi diagramas.pdf",
            "Otis Xizi escaleras digramas.pdf",
            "Otis escaleras ecs 3 diagramas.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "mag",
        &[
            "Mag completo.pdf",
            "Manual Mag ADV Total 2 pb.pdf",
            "Mag ADV Total 2 pb.pdf",
            "MAG GEN2-1.pdf",
        ],
        &[],
        &[],
        &[],
    ),
    entry(
        "diagnostico_falhas",
        &[
            "Diagnóstico de Falhas Otis red1-1.pdf",
            "Otis diversos falhas.pdf",
            "Manual Diagnóstico de Falhas (Troubleshooting).pdf",
            "manual geral otis (1).pdf",
        ],
        &[],
        &[],
        &[],
    ),
];

static OTIS_EQUIPMENT: &[&str] = &[
    "gen2", "ovf10", "ovf20", "lcb1", "lcb2", "lcbii", "rcb2", "gecb", "adv", "mrl", "do2000",
    "xo508", "mag", "otismatic", "miconic", "vw", "lva", "cfw", "gdcb", "escada", "nce", "bx",
];

lazy_static! {
    static ref OTIS: DomainProfile = DomainProfile {
        brand: "otis",
        knowledge: OTIS_KNOWLEDGE,
        expansions: vec![
            ExpansionRule {
                trigger: Regex::new(
                    r"(?i)\b(porta|portas|trinco|intertrav\w*|fechamento|abre\s+e\s+fecha|n[aã]o\s+parte)\b"
                )
                .unwrap(),
                terms: &["DW", "DFC", "ES"],
            },
            ExpansionRule {
                trigger: Regex::new(r"(?i)\b(seguran[cç]a|cadeia|safety|es)\b").unwrap(),
                terms: &["ES"],
            },
        ],
        equipment_vocabulary: OTIS_EQUIPMENT,
    };
    static ref GENERIC: DomainProfile = DomainProfile {
        brand: "",
        knowledge: &[],
        expansions: Vec::new(),
        equipment_vocabulary: &[],
    };
}

fn clean_key(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect()
}

impl DomainProfile {
    /// Profile for a brand slug; unknown brands get an empty profile
    pub fn for_brand(slug: &str) -> &'static DomainProfile {
        if slug.eq_ignore_ascii_case(OTIS.brand) {
            &*OTIS
        } else {
            &*GENERIC
        }
    }

    /// Manuals related to the known equipment that are not already cited.
    /// At most `limit` entries, in discovery order. Cited names are matched
    /// on their display form, so "Manual GEN2" excludes "Manual GEN2.pdf".
    pub fn related_documents(
        &self,
        known: &KnownContext,
        cited: &[&str],
        limit: usize,
    ) -> Vec<String> {
        let cited: Vec<&str> = cited.iter().map(|c| display_name(c)).collect();
        let mut related: Vec<String> = Vec::new();
        let push = |item: String, related: &mut Vec<String>| {
            if !related.contains(&item) && !cited.contains(&display_name(&item)) {
                related.push(item);
            }
        };

        if let Some(model) = known.model.as_deref().map(clean_key) {
            for entry in self.knowledge {
                let key = clean_key(entry.key);
                if !(model.contains(&key) || key.contains(&model)) {
                    continue;
                }
                for hardware in entry.boards.iter().chain(entry.drives.iter()) {
                    let hw = clean_key(hardware);
                    for other in self.knowledge {
                        if clean_key(other.key).contains(&hw) {
                            for doc in other.docs.iter().take(2) {
                                push(doc.to_string(), &mut related);
                            }
                        }
                    }
                }
                for r in entry.related {
                    push(format!("Documentos sobre {}", r), &mut related);
                }
            }
        }

        for hardware in [known.board.as_deref(), known.drive.as_deref()]
            .into_iter()
            .flatten()
        {
            let hw = clean_key(hardware);
            for entry in self.knowledge {
                if clean_key(entry.key) == hw {
                    for doc in entry.docs.iter().take(2) {
                        push(doc.to_string(), &mut related);
                    }
                }
            }
        }

        related.truncate(limit);
        related
    }

    /// Distinct equipment names found in filenames, uppercased and sorted
    pub fn equipment_in(&self, filenames: &[&str]) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for name in filenames {
            let squashed: String = name
                .to_lowercase()
                .chars()
                .filter(|c| !matches!(c, ' ' | '-'))
                .collect();
            for equipment in self.equipment_vocabulary {
                if squashed.contains(equipment) {
                    found.insert(equipment.to_uppercase());
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lookup() {
        assert_eq!(DomainProfile::for_brand("OTIS").brand, "otis");
        assert!(DomainProfile::for_brand("atlas").knowledge.is_empty());
    }

    #[test]
    fn test_related_documents_for_model() {
        let profile = DomainProfile::for_brand("otis");
        let known = KnownContext {
            model: Some("Gen2".into()),
            ..Default::default()
        };
        let related = profile.related_documents(&known, &["Manual GECB gen2-1.pdf"], 5);
        assert!(related.len() <= 5);
        assert!(!related.contains(&"Manual GECB gen2-1.pdf".to_string()));
        assert!(related.contains(&"GECB+reference+2007.pdf".to_string()));
    }

    #[test]
    fn test_related_documents_exclude_cited_display_names() {
        let profile = DomainProfile::for_brand("otis");
        let known = KnownContext {
            board: Some("GECB".into()),
            ..Default::default()
        };
        let cited = [display_name("GECB+reference+2007.pdf")];
        assert_eq!(cited[0], "GECB+reference+2007");

        let related = profile.related_documents(&known, &cited, 5);
        assert!(!related.contains(&"GECB+reference+2007.pdf".to_string()));
        assert!(related.contains(&"Manual GECB gen2-1.pdf".to_string()));
    }

    #[test]
    fn test_related_documents_related_labels() {
        let profile = DomainProfile::for_brand("otis");
        let known = KnownContext {
            model: Some("OVF10".into()),
            ..Default::default()
        };
        let related = profile.related_documents(&known, &[], 10);
        assert!(related.contains(&"Documentos sobre ADV-210".to_string()));
    }

    #[test]
    fn test_equipment_in_filenames() {
        let profile = DomainProfile::for_brand("otis");
        let found = profile.equipment_in(&["Manual GEN2.pdf", "ADV-210 BOS9693A.pdf", "mrl.pdf"]);
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["ADV".to_string(), "GEN2".to_string(), "MRL".to_string()]
        );
    }
}
