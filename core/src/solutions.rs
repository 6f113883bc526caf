use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::FieldViolation;
use crate::scenarios::{Cohort, ScenarioCatalog};

/// Image shown next to a solution when none was provided.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=Solucao";

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("email pattern is valid"));

/// A person who worked on a solution. No identity of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    #[serde(rename = "nome_completo", default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

impl Participant {
    /// Loose plausibility check: something on both sides of a single "@".
    pub fn has_plausible_email(&self) -> bool {
        EMAIL_SHAPE.is_match(self.email.trim())
    }
}

/// The four-part structured description of a solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DescriptionBlock {
    #[serde(rename = "resumo")]
    pub summary: String,
    #[serde(rename = "problema_que_resolve")]
    pub problem_solved: String,
    #[serde(rename = "como_funciona")]
    pub how_it_works: String,
    #[serde(rename = "relacao_com_os_cenarios")]
    pub relation_to_scenarios: String,
}

/// Fallback text used when refinement could not produce a field. Kept
/// deterministic so a review always starts from the same editable text.
pub mod placeholders {
    pub const SUMMARY: &str = "Resumo a completar: descreva a solução em uma ou duas frases.";
    pub const PROBLEM_SOLVED: &str =
        "Problema a completar: explique qual problema do cenário a solução resolve.";
    pub const HOW_IT_WORKS: &str =
        "Funcionamento a completar: explique como a solução funciona na prática.";
    pub const RELATION_TO_SCENARIOS: &str =
        "Relação a completar: explique como a solução se conecta aos cenários escolhidos.";
}

/// Description fields as they arrive from a transformation that may leave
/// some of them out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PartialDescription {
    #[serde(rename = "resumo", default)]
    pub summary: Option<String>,
    #[serde(rename = "problema_que_resolve", default)]
    pub problem_solved: Option<String>,
    #[serde(rename = "como_funciona", default)]
    pub how_it_works: Option<String>,
    #[serde(rename = "relacao_com_os_cenarios", default)]
    pub relation_to_scenarios: Option<String>,
}

fn filled(value: Option<String>, fallback: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

impl DescriptionBlock {
    /// Every field set to its placeholder.
    pub fn placeholder() -> Self {
        Self::with_fallbacks(PartialDescription::default())
    }

    /// Build a complete block, substituting the placeholder for any field
    /// that is missing or blank.
    pub fn with_fallbacks(partial: PartialDescription) -> Self {
        Self {
            summary: filled(partial.summary, placeholders::SUMMARY),
            problem_solved: filled(partial.problem_solved, placeholders::PROBLEM_SOLVED),
            how_it_works: filled(partial.how_it_works, placeholders::HOW_IT_WORKS),
            relation_to_scenarios: filled(
                partial.relation_to_scenarios,
                placeholders::RELATION_TO_SCENARIOS,
            ),
        }
    }

}

impl From<DescriptionBlock> for PartialDescription {
    fn from(block: DescriptionBlock) -> Self {
        Self {
            summary: Some(block.summary),
            problem_solved: Some(block.problem_solved),
            how_it_works: Some(block.how_it_works),
            relation_to_scenarios: Some(block.relation_to_scenarios),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Upload,
    #[default]
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageReference {
    #[serde(rename = "tipo", default)]
    pub kind: ImageKind,
    #[serde(default)]
    pub url: String,
}

impl Default for ImageReference {
    fn default() -> Self {
        Self {
            kind: ImageKind::Url,
            url: PLACEHOLDER_IMAGE_URL.to_string(),
        }
    }
}

impl ImageReference {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: ImageKind::Url,
            url: url.into(),
        }
    }
}

/// The full mutable field set of a solution: the body of `POST /v1/solutions`
/// and `PUT /v1/solutions/{id}`. Id and submission timestamp are server-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SolutionPayload {
    #[serde(rename = "nome_da_solucao")]
    pub solution_name: String,
    #[serde(rename = "turma")]
    pub cohort: Cohort,
    #[serde(rename = "participantes", default)]
    pub participants: Vec<Participant>,
    #[serde(rename = "cenarios_relacionados", default)]
    pub scenario_ids: Vec<String>,
    #[serde(rename = "descricao_refinada")]
    pub description: DescriptionBlock,
    #[serde(rename = "imagem", default)]
    pub image: ImageReference,
    #[serde(
        rename = "link_solucao",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub link: Option<String>,
}

impl SolutionPayload {
    /// Substitute the placeholder image for an absent URL. Everything else is
    /// stored exactly as submitted.
    pub fn normalized(mut self) -> Self {
        if self.image.url.trim().is_empty() {
            self.image.url = PLACEHOLDER_IMAGE_URL.to_string();
        }
        self
    }
}

/// A solution body as received, before validation. Every field may be absent
/// so that one response can name all of the missing ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubmissionForm {
    #[serde(rename = "nome_da_solucao", default)]
    pub solution_name: Option<String>,
    /// `A` or `B`
    #[serde(rename = "turma", default)]
    pub cohort: Option<String>,
    #[serde(rename = "participantes", default)]
    pub participants: Vec<Participant>,
    #[serde(rename = "cenarios_relacionados", default)]
    pub scenario_ids: Vec<String>,
    #[serde(rename = "descricao_refinada", default)]
    pub description: Option<PartialDescription>,
    #[serde(rename = "imagem", default)]
    pub image: Option<ImageReference>,
    #[serde(rename = "link_solucao", default)]
    pub link: Option<String>,
}

impl From<SolutionPayload> for SubmissionForm {
    fn from(payload: SolutionPayload) -> Self {
        Self {
            solution_name: Some(payload.solution_name),
            cohort: Some(payload.cohort.to_string()),
            participants: payload.participants,
            scenario_ids: payload.scenario_ids,
            description: Some(payload.description.into()),
            image: Some(payload.image),
            link: payload.link,
        }
    }
}

/// A persisted registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Solution {
    /// Server-generated id (UUIDv7)
    pub id: Uuid,
    #[serde(rename = "nome_da_solucao")]
    pub solution_name: String,
    #[serde(rename = "turma")]
    pub cohort: Cohort,
    #[serde(rename = "participantes")]
    pub participants: Vec<Participant>,
    #[serde(rename = "cenarios_relacionados")]
    pub scenario_ids: Vec<String>,
    #[serde(rename = "descricao_refinada")]
    pub description: DescriptionBlock,
    #[serde(rename = "imagem")]
    pub image: ImageReference,
    #[serde(rename = "link_solucao", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Server-assigned submission time
    #[serde(rename = "data_submissao")]
    pub submitted_at: DateTime<Utc>,
}

impl Solution {
    pub fn from_payload(id: Uuid, submitted_at: DateTime<Utc>, payload: SolutionPayload) -> Self {
        Self {
            id,
            solution_name: payload.solution_name,
            cohort: payload.cohort,
            participants: payload.participants,
            scenario_ids: payload.scenario_ids,
            description: payload.description,
            image: payload.image,
            link: payload.link,
            submitted_at,
        }
    }

    /// The mutable field set, as it would be sent back for a full update.
    pub fn payload(&self) -> SolutionPayload {
        SolutionPayload {
            solution_name: self.solution_name.clone(),
            cohort: self.cohort,
            participants: self.participants.clone(),
            scenario_ids: self.scenario_ids.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            link: self.link.clone(),
        }
    }
}

/// Self-declared role of whoever submits. Not authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmitterRole {
    #[default]
    Student,
    Professor,
}

impl SubmitterRole {
    /// Students may only reference scenarios of the solution's own cohort.
    pub fn restricted_to_own_cohort(&self) -> bool {
        matches!(self, SubmitterRole::Student)
    }
}

fn required_text(
    violations: &mut Vec<FieldViolation>,
    field: &str,
    value: Option<String>,
) -> String {
    match value {
        None => {
            violations.push(FieldViolation::new(field, "is required"));
            String::new()
        }
        Some(v) => {
            if v.trim().is_empty() {
                violations.push(FieldViolation::new(field, "must not be empty"));
            }
            v
        }
    }
}

/// Check every submission constraint without stopping at the first failure,
/// and only then build the payload that may be stored.
pub fn validate_submission(
    form: SubmissionForm,
    catalog: &ScenarioCatalog,
    role: SubmitterRole,
) -> Result<SolutionPayload, Vec<FieldViolation>> {
    let mut violations = Vec::new();

    let solution_name = required_text(&mut violations, "nome_da_solucao", form.solution_name);

    let cohort = match form.cohort.as_deref() {
        None => {
            violations.push(FieldViolation::new("turma", "is required"));
            None
        }
        Some(raw) => match raw.parse::<Cohort>() {
            Ok(cohort) => Some(cohort),
            Err(e) => {
                violations.push(FieldViolation::new("turma", e.to_string()));
                None
            }
        },
    };

    if form.participants.is_empty() {
        violations.push(FieldViolation::new(
            "participantes",
            "at least one participant is required",
        ));
    }
    for (i, participant) in form.participants.iter().enumerate() {
        if participant.full_name.trim().is_empty() {
            violations.push(FieldViolation::new(
                format!("participantes[{i}].nome_completo"),
                "participant name must not be empty",
            ));
        }
        if !participant.has_plausible_email() {
            violations.push(FieldViolation::new(
                format!("participantes[{i}].email"),
                format!("'{}' is not a plausible email address", participant.email),
            ));
        }
    }

    if form.scenario_ids.is_empty() {
        violations.push(FieldViolation::new(
            "cenarios_relacionados",
            "at least one related scenario is required",
        ));
    }
    for (i, id) in form.scenario_ids.iter().enumerate() {
        match (catalog.get(id), cohort) {
            (None, _) => violations.push(FieldViolation::new(
                format!("cenarios_relacionados[{i}]"),
                format!("unknown scenario '{id}'"),
            )),
            (Some(scenario), Some(cohort))
                if role.restricted_to_own_cohort() && scenario.cohort != cohort =>
            {
                violations.push(FieldViolation::new(
                    format!("cenarios_relacionados[{i}]"),
                    format!(
                        "scenario '{id}' belongs to cohort {}, not {cohort}",
                        scenario.cohort
                    ),
                ))
            }
            _ => {}
        }
    }

    let description = match form.description {
        None => {
            violations.push(FieldViolation::new(
                "descricao_refinada",
                "structured description is required",
            ));
            None
        }
        Some(partial) => Some(DescriptionBlock {
            summary: required_text(&mut violations, "descricao_refinada.resumo", partial.summary),
            problem_solved: required_text(
                &mut violations,
                "descricao_refinada.problema_que_resolve",
                partial.problem_solved,
            ),
            how_it_works: required_text(
                &mut violations,
                "descricao_refinada.como_funciona",
                partial.how_it_works,
            ),
            relation_to_scenarios: required_text(
                &mut violations,
                "descricao_refinada.relacao_com_os_cenarios",
                partial.relation_to_scenarios,
            ),
        }),
    };

    match (cohort, description) {
        (Some(cohort), Some(description)) if violations.is_empty() => Ok(SolutionPayload {
            solution_name,
            cohort,
            participants: form.participants,
            scenario_ids: form.scenario_ids,
            description,
            image: form.image.unwrap_or_default(),
            link: form.link,
        }
        .normalized()),
        _ => Err(violations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> DescriptionBlock {
        DescriptionBlock {
            summary: "Quiosque solar de recarga".to_string(),
            problem_solved: "Falta de energia em praças".to_string(),
            how_it_works: "Painéis alimentam baterias públicas".to_string(),
            relation_to_scenarios: "Responde ao apagão do cenário A2".to_string(),
        }
    }

    fn payload() -> SolutionPayload {
        SolutionPayload {
            solution_name: "Solar Kiosk".to_string(),
            cohort: Cohort::A,
            participants: vec![Participant {
                full_name: "Ana Silva".to_string(),
                email: "ana@x.com".to_string(),
            }],
            scenario_ids: vec!["CENARIO_A1".to_string()],
            description: description(),
            image: ImageReference::url("https://example.com/a.png"),
            link: None,
        }
    }

    fn fields_of(violations: &[FieldViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn complete_payload_is_valid() {
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(
            validate_submission(payload().into(), catalog, SubmitterRole::Student),
            Ok(payload())
        );
    }

    #[test]
    fn empty_scenarios_cite_at_least_one_related_scenario() {
        let mut p = payload();
        p.scenario_ids.clear();
        let violations =
            validate_submission(p.into(), ScenarioCatalog::builtin(), SubmitterRole::Student)
                .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(
            violations[0]
                .message
                .contains("at least one related scenario")
        );
    }

    #[test]
    fn every_violation_is_reported_at_once() {
        let p = SolutionPayload {
            solution_name: "  ".to_string(),
            cohort: Cohort::A,
            participants: vec![Participant {
                full_name: String::new(),
                email: "not-an-email".to_string(),
            }],
            scenario_ids: vec!["CENARIO_Z9".to_string()],
            description: DescriptionBlock {
                summary: String::new(),
                ..description()
            },
            image: ImageReference::default(),
            link: None,
        };
        let violations =
            validate_submission(p.into(), ScenarioCatalog::builtin(), SubmitterRole::Student)
                .unwrap_err();
        assert_eq!(
            fields_of(&violations),
            vec![
                "nome_da_solucao",
                "participantes[0].nome_completo",
                "participantes[0].email",
                "cenarios_relacionados[0]",
                "descricao_refinada.resumo",
            ]
        );
    }

    #[test]
    fn absent_fields_are_all_named() {
        let form: SubmissionForm = serde_json::from_value(serde_json::json!({
            "participantes": [{"email": "ana@x.com"}],
            "cenarios_relacionados": ["CENARIO_A1"],
            "descricao_refinada": {"resumo": "r", "como_funciona": "c"}
        }))
        .unwrap();
        let violations =
            validate_submission(form, ScenarioCatalog::builtin(), SubmitterRole::Student)
                .unwrap_err();
        assert_eq!(
            fields_of(&violations),
            vec![
                "nome_da_solucao",
                "turma",
                "participantes[0].nome_completo",
                "descricao_refinada.problema_que_resolve",
                "descricao_refinada.relacao_com_os_cenarios",
            ]
        );

        let violations = validate_submission(
            SubmissionForm::default(),
            ScenarioCatalog::builtin(),
            SubmitterRole::Student,
        )
        .unwrap_err();
        assert_eq!(
            fields_of(&violations),
            vec![
                "nome_da_solucao",
                "turma",
                "participantes",
                "cenarios_relacionados",
                "descricao_refinada",
            ]
        );
    }

    #[test]
    fn unknown_cohort_is_a_violation_not_a_parse_error() {
        let mut form = SubmissionForm::from(payload());
        form.cohort = Some("C".to_string());
        let violations =
            validate_submission(form, ScenarioCatalog::builtin(), SubmitterRole::Student)
                .unwrap_err();
        assert_eq!(fields_of(&violations), vec!["turma"]);
    }

    #[test]
    fn missing_participants_is_a_violation() {
        let mut p = payload();
        p.participants.clear();
        let violations =
            validate_submission(p.into(), ScenarioCatalog::builtin(), SubmitterRole::Student)
                .unwrap_err();
        assert_eq!(fields_of(&violations), vec!["participantes"]);
    }

    #[test]
    fn students_cannot_reference_other_cohort_scenarios() {
        let mut p = payload();
        p.scenario_ids = vec!["CENARIO_A1".to_string(), "CENARIO_B1".to_string()];
        let violations = validate_submission(
            p.clone().into(),
            ScenarioCatalog::builtin(),
            SubmitterRole::Student,
        )
        .unwrap_err();
        assert_eq!(fields_of(&violations), vec!["cenarios_relacionados[1]"]);

        assert!(
            validate_submission(p.into(), ScenarioCatalog::builtin(), SubmitterRole::Professor)
                .is_ok()
        );
    }

    #[test]
    fn email_plausibility_is_loose() {
        let ok = |email: &str| {
            Participant {
                full_name: "x".to_string(),
                email: email.to_string(),
            }
            .has_plausible_email()
        };
        assert!(ok("ana@x.com"));
        assert!(ok("ana@localhost"));
        assert!(!ok("ana.x.com"));
        assert!(!ok("@x.com"));
        assert!(!ok("ana@"));
        assert!(!ok("a b@x.com"));
    }

    #[test]
    fn fallbacks_fill_missing_and_blank_fields() {
        let block = DescriptionBlock::with_fallbacks(PartialDescription {
            summary: Some("  Um resumo  ".to_string()),
            problem_solved: Some("   ".to_string()),
            how_it_works: None,
            relation_to_scenarios: Some("Relação".to_string()),
        });
        assert_eq!(block.summary, "Um resumo");
        assert_eq!(block.problem_solved, placeholders::PROBLEM_SOLVED);
        assert_eq!(block.how_it_works, placeholders::HOW_IT_WORKS);
        assert_eq!(block.relation_to_scenarios, "Relação");
        assert_eq!(DescriptionBlock::placeholder(), DescriptionBlock::placeholder());
    }

    #[test]
    fn normalization_only_defaults_the_image() {
        let mut p = payload();
        p.image = ImageReference::url("");
        p.link = Some("https://example.com/demo".to_string());
        p.solution_name = "  Solar Kiosk ".to_string();
        let p = p.normalized();
        assert_eq!(p.image.url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(p.link.as_deref(), Some("https://example.com/demo"));
        assert_eq!(p.solution_name, "  Solar Kiosk ");
    }

    #[test]
    fn solution_uses_wire_field_names() {
        let solution = Solution::from_payload(Uuid::now_v7(), Utc::now(), payload());
        let value = serde_json::to_value(&solution).unwrap();
        for key in [
            "id",
            "nome_da_solucao",
            "turma",
            "participantes",
            "cenarios_relacionados",
            "descricao_refinada",
            "imagem",
            "data_submissao",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert!(value.get("link_solucao").is_none());
        assert_eq!(value["imagem"]["tipo"], "url");
        assert_eq!(value["participantes"][0]["nome_completo"], "Ana Silva");
        assert_eq!(value["descricao_refinada"]["como_funciona"], description().how_it_works);
    }

    #[test]
    fn form_without_image_validates_to_placeholder() {
        let body = serde_json::json!({
            "nome_da_solucao": "Solar Kiosk",
            "turma": "A",
            "participantes": [{"nome_completo": "Ana Silva", "email": "ana@x.com"}],
            "cenarios_relacionados": ["CENARIO_A1"],
            "descricao_refinada": {
                "resumo": "r",
                "problema_que_resolve": "p",
                "como_funciona": "c",
                "relacao_com_os_cenarios": "x"
            }
        });
        let form: SubmissionForm = serde_json::from_value(body).unwrap();
        let p = validate_submission(form, ScenarioCatalog::builtin(), SubmitterRole::Student)
            .unwrap();
        assert_eq!(p.image, ImageReference::default());
        assert_eq!(p.link, None);
    }
}
