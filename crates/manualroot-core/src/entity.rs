//! Known-context extraction
//!
//! Pulls equipment identifiers out of everything the user has said so far.
//! The context is rebuilt from the whole conversation on every turn and is
//! never patched in place.

use crate::dialogue::{Role, Turn};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Field of [`KnownContext`] a pattern fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityField {
    Model,
    Board,
    Drive,
    Symptom,
    ErrorCode,
}

impl EntityField {
    pub const ALL: [EntityField; 5] = [
        EntityField::Model,
        EntityField::Board,
        EntityField::Drive,
        EntityField::Symptom,
        EntityField::ErrorCode,
    ];
}

/// How a match becomes the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Always store this canonical name
    Fixed(&'static str),
    /// Uppercased capture
    Upper,
    /// Uppercased capture with whitespace removed ("lcb 2" -> "LCB2")
    UpperCompact,
    /// Capture as written
    Verbatim,
}

impl Normalizer {
    fn apply(&self, captured: &str) -> String {
        match self {
            Self::Fixed(name) => name.to_string(),
            Self::Upper => captured.trim().to_uppercase(),
            Self::UpperCompact => captured
                .split_whitespace()
                .collect::<String>()
                .to_uppercase(),
            Self::Verbatim => captured.trim().to_string(),
        }
    }
}

/// One ordered extraction rule; group 1 is the captured value
pub struct EntityPattern {
    pub field: EntityField,
    pub regex: Regex,
    pub normalizer: Normalizer,
}

fn rule(field: EntityField, pattern: &str, normalizer: Normalizer) -> EntityPattern {
    EntityPattern {
        field,
        regex: Regex::new(&format!("(?i){}", pattern)).unwrap(),
        normalizer,
    }
}

lazy_static! {
    /// Evaluated in order; the first match per field wins
    pub static ref ENTITY_PATTERNS: Vec<EntityPattern> = {
        use EntityField::*;
        use Normalizer::*;
        vec![
            rule(Model, r"\b(gen\s?\d\w*)\b", Fixed("Gen2")),
            rule(Model, r"\b(adv\s?-?\s?\d{3}\w*)\b", Upper),
            rule(Model, r"\b(advz[aã]o)\b", Fixed("ADVzão")),
            rule(Model, r"\b(mrl)\b", Fixed("MRL")),
            rule(Model, r"\b(otismatic)\b", Fixed("OTISMATIC")),
            rule(Model, r"\b(miconic\s*(?:bx|lx)?)\b", Upper),
            rule(Model, r"\b(mag)\b", Fixed("MAG")),
            rule(Model, r"\b(xo\s?508)\b", Fixed("XO 508")),
            rule(Model, r"\b(do\s?2000)\b", Fixed("DO 2000")),
            rule(Model, r"\b(mrds)\b", Fixed("MRDS")),
            rule(Model, r"\b(ledo)\b", Fixed("LEDO")),
            rule(Model, r"\b(vw\s?\d?)\b", Upper),
            rule(Model, r"\b(escada\s*rolante|nce)\b", Fixed("Escada Rolante")),
            rule(Model, r"\b(bx)\b", Fixed("BX")),
            rule(Board, r"\b(gecb)\b", Fixed("GECB")),
            rule(Board, r"\b(gdcb)\b", Fixed("GDCB")),
            rule(Board, r"\b(lcb\s?ii|lcb\s?2|lcbii)\b", UpperCompact),
            rule(Board, r"\b(lcb\s?[i1]|lcbi)\b", UpperCompact),
            rule(Board, r"\b(rcb\s?\d)\b", UpperCompact),
            rule(Board, r"\b(gscb)\b", Fixed("GSCB")),
            rule(Board, r"\b(tcbc)\b", Fixed("TCBC")),
            rule(Board, r"\b(mcs\s?\d{3})\b", UpperCompact),
            rule(Drive, r"\b(ovf\s?\d{1,2})\b", UpperCompact),
            rule(Drive, r"\b(cvf)\b", Fixed("CVF")),
            rule(Drive, r"\b(lvf)\b", Fixed("LVF")),
            rule(Drive, r"\b(lva|ultra\s*drive)\b", Fixed("LVA")),
            rule(Drive, r"\b(cfw\s?\d{2})\b", UpperCompact),
            rule(Drive, r"\b(weg)\b", Fixed("WEG")),
            rule(Symptom, r"(porta\s+abre\s+e\s+fecha)", Fixed("porta abre e fecha")),
            rule(Symptom, r"(n[aã]o\s+parte|n[aã]o\s+anda|n[aã]o\s+funciona)", Verbatim),
            rule(Symptom, r"(n[aã]o\s+sobe|n[aã]o\s+desce)", Verbatim),
            rule(Symptom, r"(n[aã]o\s+fecha|n[aã]o\s+abre)", Verbatim),
            rule(Symptom, r"(n[aã]o\s+liga)", Fixed("não liga")),
            rule(Symptom, r"(trem?e|vibra|ru[ií]do)", Verbatim),
            rule(Symptom, r"(para\s+entre\s+andares|para\s+no\s+meio)", Fixed("para entre andares")),
            rule(Symptom, r"(desnivelad|desenivel)", Fixed("desnivelamento")),
            rule(ErrorCode, r"\berro\s+([a-z]?\d{2,4})\b", Upper),
            rule(ErrorCode, r"\bc[oó]digo\s+([a-z]?\d{2,4})\b", Upper),
            rule(ErrorCode, r"\bfalha\s+([a-z]?\d{2,4})\b", Upper),
            rule(ErrorCode, r"\b(e\d{3})\b", Upper),
            rule(ErrorCode, r"\b(uv\d{1,2})\b", Upper),
            rule(ErrorCode, r"\b(oc\d{1,2})\b", Upper),
            rule(ErrorCode, r"\b(ol\d{1,2})\b", Upper),
        ]
    };

    static ref PART_NUMBER_RE: Regex = Regex::new(r"(?i)\b([a-z]{3}\d{4,}[a-z]*)\b").unwrap();

    /// Anything that looks like a model, board, drive or part code
    static ref IDENTIFIER_HINTS: Vec<Regex> = [
        r"\b[a-z]{1,5}\s?-?\s?\d{1,5}[a-z]?\b",
        r"\b\d{3,5}[a-z]{0,3}\b",
        r"\bgen\s?\d\b",
        r"\b[a-z]{3}\d{4,}[a-z]*\b",
        r"\b(lcb[i12]|rcb\d|gscb|tcbc|gecb|gdcb)\b",
        r"\b(otismatic|miconic|mag)\b",
        r"\b(mrl|do\s?2000|mrds|ledo)\b",
        r"\b(ovf\s?\d{1,2}|cvf|lvf|cfw\s?\d{2})\b",
        r"\b(advz[aã]o|adv)\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect();
}

/// Technical identifiers inferred from a whole conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownContext {
    pub model: Option<String>,
    pub board: Option<String>,
    pub drive: Option<String>,
    pub symptom: Option<String>,
    pub error_code: Option<String>,
    /// Free-form identifiers such as part numbers
    pub other: Vec<String>,
}

/// Facts still needed for a precise diagnosis, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissingInfo {
    Model,
    BoardOrDrive,
    SymptomOrError,
}

impl MissingInfo {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Model => "modelo/geração do elevador",
            Self::BoardOrDrive => "placa/controlador ou drive/inversor",
            Self::SymptomOrError => "sintoma observado ou código de erro",
        }
    }
}

impl KnownContext {
    pub fn get(&self, field: EntityField) -> Option<&str> {
        match field {
            EntityField::Model => self.model.as_deref(),
            EntityField::Board => self.board.as_deref(),
            EntityField::Drive => self.drive.as_deref(),
            EntityField::Symptom => self.symptom.as_deref(),
            EntityField::ErrorCode => self.error_code.as_deref(),
        }
    }

    fn slot(&mut self, field: EntityField) -> &mut Option<String> {
        match field {
            EntityField::Model => &mut self.model,
            EntityField::Board => &mut self.board,
            EntityField::Drive => &mut self.drive,
            EntityField::Symptom => &mut self.symptom,
            EntityField::ErrorCode => &mut self.error_code,
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityField::ALL.iter().all(|f| self.get(*f).is_none()) && self.other.is_empty()
    }

    /// Missing facts in priority order: model > board/drive > symptom/error
    pub fn missing_info(&self) -> Vec<MissingInfo> {
        let mut missing = Vec::new();
        if self.model.is_none() {
            missing.push(MissingInfo::Model);
        }
        if self.board.is_none() && self.drive.is_none() {
            missing.push(MissingInfo::BoardOrDrive);
        }
        if self.symptom.is_none() && self.error_code.is_none() {
            missing.push(MissingInfo::SymptomOrError);
        }
        missing
    }

    /// Non-empty values, for keyword fallbacks and prompts
    pub fn values(&self) -> Vec<&str> {
        EntityField::ALL
            .iter()
            .filter_map(|f| self.get(*f))
            .collect()
    }
}

/// Text the extractor sees: all prior user turns, then the current message
pub fn user_text(message: &str, history: &[Turn]) -> String {
    let prior: Vec<&str> = history
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .collect();
    format!("{} {}", prior.join(" "), message).trim().to_lowercase()
}

/// Re-derive the known context from the full conversation
pub fn extract_known_context(message: &str, history: &[Turn]) -> KnownContext {
    extract_from_text(&user_text(message, history))
}

/// Apply the ordered pattern table to already-concatenated text
pub fn extract_from_text(text: &str) -> KnownContext {
    let mut context = KnownContext::default();

    for pattern in ENTITY_PATTERNS.iter() {
        let slot = context.slot(pattern.field);
        if slot.is_some() {
            continue;
        }
        if let Some(captured) = pattern.regex.captures(text).and_then(|c| c.get(1)) {
            *slot = Some(pattern.normalizer.apply(captured.as_str()));
        }
    }

    for m in PART_NUMBER_RE.captures_iter(text).filter_map(|c| c.get(1)) {
        let entry = format!("Part number: {}", m.as_str().to_uppercase());
        if !context.other.contains(&entry) {
            context.other.push(entry);
        }
    }

    context
}

/// Whether the text carries a model, board, drive or part identifier
pub fn has_identifier_hint(text: &str) -> bool {
    let lower = text.to_lowercase();
    IDENTIFIER_HINTS.iter().any(|re| re.is_match(&lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_compiles_and_matches_its_example() {
        let examples: &[(&str, EntityField, &str)] = &[
            ("elevador gen 2 parado", EntityField::Model, "Gen2"),
            ("adv-210 antigo", EntityField::Model, "ADV-210"),
            ("um advzão", EntityField::Model, "ADVzão"),
            ("miconic bx", EntityField::Model, "MICONIC BX"),
            ("xo508 com falha", EntityField::Model, "XO 508"),
            ("placa lcb 2", EntityField::Board, "LCB2"),
            ("placa lcb ii", EntityField::Board, "LCBII"),
            ("placa lcbi", EntityField::Board, "LCBI"),
            ("rcb 2 travada", EntityField::Board, "RCB2"),
            ("drive ovf 10", EntityField::Drive, "OVF10"),
            ("ultra drive", EntityField::Drive, "LVA"),
            ("cfw 09", EntityField::Drive, "CFW09"),
            ("a porta abre e fecha", EntityField::Symptom, "porta abre e fecha"),
            ("cabina não sobe", EntityField::Symptom, "não sobe"),
            ("ficou desnivelado", EntityField::Symptom, "desnivelamento"),
            ("erro e12 no display", EntityField::ErrorCode, "E12"),
            ("código 0710", EntityField::ErrorCode, "0710"),
            ("mostra uv1", EntityField::ErrorCode, "UV1"),
        ];
        for (text, field, expected) in examples {
            let ctx = extract_from_text(text);
            assert_eq!(ctx.get(*field), Some(*expected), "text: {}", text);
        }
    }

    #[test]
    fn test_first_match_wins_in_table_order() {
        // gecb is listed before lcb2 even though lcb2 appears first in the text
        let ctx = extract_from_text("lcb2 ou gecb");
        assert_eq!(ctx.board.as_deref(), Some("GECB"));
    }

    #[test]
    fn test_context_spans_prior_user_turns_only() {
        let history = vec![
            Turn::user("tenho um GEN2"),
            Turn::assistant("Qual a placa do OVF20 instalada nesse elevador?"),
        ];
        let ctx = extract_known_context("a porta não fecha", &history);
        assert_eq!(ctx.model.as_deref(), Some("Gen2"));
        assert_eq!(ctx.drive, None);
        assert_eq!(ctx.symptom.as_deref(), Some("não fecha"));
    }

    #[test]
    fn test_part_numbers_collected() {
        let ctx = extract_from_text("placa jaa30171aaa e baa21000s");
        assert_eq!(
            ctx.other,
            vec![
                "Part number: JAA30171AAA".to_string(),
                "Part number: BAA21000S".to_string()
            ]
        );
    }

    #[test]
    fn test_missing_info_priority() {
        let mut ctx = KnownContext::default();
        assert_eq!(
            ctx.missing_info(),
            vec![
                MissingInfo::Model,
                MissingInfo::BoardOrDrive,
                MissingInfo::SymptomOrError
            ]
        );
        ctx.model = Some("Gen2".into());
        ctx.drive = Some("OVF20".into());
        assert_eq!(ctx.missing_info(), vec![MissingInfo::SymptomOrError]);
        ctx.error_code = Some("E12".into());
        assert!(ctx.missing_info().is_empty());
    }

    #[test]
    fn test_identifier_hint() {
        assert!(has_identifier_hint("Falha no OVF10"));
        assert!(has_identifier_hint("placa GECB"));
        assert!(!has_identifier_hint("a porta do elevador não fecha"));
    }
}
