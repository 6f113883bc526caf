//! `refine(rawText, scenarioIds) -> DescriptionBlock`.

use portal_core::error::FieldViolation;
use portal_core::scenarios::{Scenario, ScenarioCatalog};
use portal_core::solutions::DescriptionBlock;

use crate::error::AppError;
use crate::genai::GenerativeAgent;

/// Check the inputs refinement needs, collecting every problem.
pub fn check_inputs<'c>(
    raw_text: &str,
    scenario_ids: &[String],
    catalog: &'c ScenarioCatalog,
) -> Result<Vec<&'c Scenario>, Vec<FieldViolation>> {
    let mut violations = Vec::new();
    if raw_text.trim().is_empty() {
        violations.push(FieldViolation::new(
            "raw_text",
            "a free-form description is required before refining",
        ));
    }
    if scenario_ids.is_empty() {
        violations.push(FieldViolation::new(
            "scenario_ids",
            "at least one related scenario is required",
        ));
    }
    let mut scenarios = Vec::with_capacity(scenario_ids.len());
    for (i, id) in scenario_ids.iter().enumerate() {
        match catalog.get(id) {
            Some(scenario) => scenarios.push(scenario),
            None => violations.push(FieldViolation::new(
                format!("scenario_ids[{i}]"),
                format!("unknown scenario '{id}'"),
            )),
        }
    }

    if violations.is_empty() {
        Ok(scenarios)
    } else {
        Err(violations)
    }
}

/// Run the external transformation. The returned block never has a blank
/// field; any failure of the capability is `RefinementUnavailable`.
pub async fn refine(
    agent: &dyn GenerativeAgent,
    catalog: &ScenarioCatalog,
    raw_text: &str,
    scenario_ids: &[String],
) -> Result<DescriptionBlock, AppError> {
    let scenarios = check_inputs(raw_text, scenario_ids, catalog)
        .map_err(|issues| AppError::ValidationFailed { issues })?;
    let owned: Vec<Scenario> = scenarios.into_iter().cloned().collect();

    let partial = agent
        .refine(raw_text.trim(), &owned)
        .await
        .map_err(|e| AppError::RefinementUnavailable {
            reason: e.to_string(),
        })?;

    let filled = [
        &partial.summary,
        &partial.problem_solved,
        &partial.how_it_works,
        &partial.relation_to_scenarios,
    ]
    .iter()
    .filter(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
    .count();
    tracing::debug!(
        model = agent.model_id(),
        scenarios = owned.len(),
        fields_from_model = filled,
        "refinement completed"
    );

    Ok(DescriptionBlock::with_fallbacks(partial))
}

#[cfg(test)]
mod tests {
    use portal_core::solutions::{PartialDescription, placeholders};

    use super::*;
    use crate::genai::GenAiError;
    use crate::genai::tests::ScriptedAgent;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_fields_get_placeholders() {
        let agent = ScriptedAgent::default().refinement(Ok(PartialDescription {
            summary: Some("Quiosque solar".to_string()),
            how_it_works: Some("  ".to_string()),
            ..PartialDescription::default()
        }));
        let block = refine(
            &agent,
            ScenarioCatalog::builtin(),
            "um quiosque solar",
            &ids(&["CENARIO_A1"]),
        )
        .await
        .unwrap();
        assert_eq!(block.summary, "Quiosque solar");
        assert_eq!(block.how_it_works, placeholders::HOW_IT_WORKS);
        assert_eq!(block.problem_solved, placeholders::PROBLEM_SOLVED);
        assert_eq!(block.relation_to_scenarios, placeholders::RELATION_TO_SCENARIOS);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_calling_out() {
        let agent = ScriptedAgent::default().refinement(Ok(PartialDescription::default()));
        let err = refine(&agent, ScenarioCatalog::builtin(), "   ", &ids(&["CENARIO_A1"]))
            .await
            .unwrap_err();
        let AppError::ValidationFailed { issues } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(issues[0].field, "raw_text");
    }

    #[tokio::test]
    async fn unknown_and_missing_scenarios_are_all_reported() {
        let agent = ScriptedAgent::default();
        let err = refine(&agent, ScenarioCatalog::builtin(), "", &[]).await.unwrap_err();
        let AppError::ValidationFailed { issues } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(issues.len(), 2);

        let err = refine(
            &agent,
            ScenarioCatalog::builtin(),
            "texto",
            &ids(&["CENARIO_A1", "CENARIO_X"]),
        )
        .await
        .unwrap_err();
        let AppError::ValidationFailed { issues } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(issues[0].field, "scenario_ids[1]");
    }

    #[tokio::test]
    async fn upstream_failure_is_refinement_unavailable() {
        let agent = ScriptedAgent::default()
            .refinement(Err(GenAiError::Timeout(std::time::Duration::from_secs(30))));
        let err = refine(&agent, ScenarioCatalog::builtin(), "texto", &ids(&["CENARIO_B2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RefinementUnavailable { .. }));
    }
}
