use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One of the two fixed student groups. Each cohort works on its own scenario set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Cohort {
    A,
    B,
}

impl Cohort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cohort::A => "A",
            Cohort::B => "B",
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cohort '{0}', expected 'A' or 'B'")]
pub struct UnknownCohort(pub String);

impl FromStr for Cohort {
    type Err = UnknownCohort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Cohort::A),
            "B" | "b" => Ok(Cohort::B),
            other => Err(UnknownCohort(other.to_string())),
        }
    }
}

/// A pre-authored "future" narrative. Immutable reference data: built once at
/// process start, never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Scenario {
    /// Stable identifier referenced by solutions (e.g. "CENARIO_A1")
    pub id: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "turma")]
    pub cohort: Cohort,
    /// Futures archetype the narrative belongs to
    #[serde(rename = "arquetipo")]
    pub archetype: String,
    #[serde(rename = "descricao")]
    pub description: String,
}

struct ScenarioSeed {
    id: &'static str,
    title: &'static str,
    cohort: Cohort,
    archetype: &'static str,
    description: &'static str,
}

const SEEDS: &[ScenarioSeed] = &[
    ScenarioSeed {
        id: "CENARIO_A1",
        title: "Cidades de Crescimento Contínuo",
        cohort: Cohort::A,
        archetype: "Crescimento Contínuo",
        description: "Em 2045 as metrópoles seguem expandindo, movidas por consumo intenso e automação. A energia barata sustenta a expansão, mas a desigualdade de acesso a serviços urbanos cresce na mesma velocidade.",
    },
    ScenarioSeed {
        id: "CENARIO_A2",
        title: "Depois do Apagão",
        cohort: Cohort::A,
        archetype: "Colapso",
        description: "Uma sequência de crises climáticas e falhas de infraestrutura deixou regiões inteiras sem rede elétrica estável. Comunidades se reorganizam em torno de recursos locais e trocas informais.",
    },
    ScenarioSeed {
        id: "CENARIO_A3",
        title: "A Cidade Regulada",
        cohort: Cohort::A,
        archetype: "Disciplina",
        description: "Para conter a escassez de água e energia, governos impuseram cotas rígidas de consumo. Cada cidadão tem um orçamento ambiental monitorado por sensores em todos os espaços públicos.",
    },
    ScenarioSeed {
        id: "CENARIO_A4",
        title: "Bairros Vivos",
        cohort: Cohort::A,
        archetype: "Transformação",
        description: "Biotecnologia e arquitetura regenerativa transformaram os bairros em ecossistemas produtivos. Edifícios cultivam alimento, tratam água e geram energia, e a fronteira entre cidade e natureza desaparece.",
    },
    ScenarioSeed {
        id: "CENARIO_B1",
        title: "Trabalho Sem Fim",
        cohort: Cohort::B,
        archetype: "Crescimento Contínuo",
        description: "Plataformas digitais dominam todas as formas de trabalho. A produtividade atinge recordes históricos, mas a jornada se dissolve ao longo do dia e o descanso virou um serviço premium.",
    },
    ScenarioSeed {
        id: "CENARIO_B2",
        title: "Redes Partidas",
        cohort: Cohort::B,
        archetype: "Colapso",
        description: "A fragmentação da internet em redes nacionais isoladas interrompeu cadeias de suprimento e sistemas de saúde. Conhecimento técnico passou a circular em bibliotecas comunitárias e rádios locais.",
    },
    ScenarioSeed {
        id: "CENARIO_B3",
        title: "Saúde Sob Medida",
        cohort: Cohort::B,
        archetype: "Disciplina",
        description: "Um sistema nacional de prevenção define rotinas de alimentação, sono e exercício para cada pessoa a partir de dados genéticos. A adesão é obrigatória para acesso a serviços públicos.",
    },
    ScenarioSeed {
        id: "CENARIO_B4",
        title: "Mentes Compartilhadas",
        cohort: Cohort::B,
        archetype: "Transformação",
        description: "Interfaces neurais permitem que grupos pensem e criem juntos em tempo real. Escolas, empresas e governos experimentam formas de decisão coletiva que dispensam representantes.",
    },
];

static BUILTIN: LazyLock<ScenarioCatalog> = LazyLock::new(|| {
    ScenarioCatalog::new(
        SEEDS
            .iter()
            .map(|seed| Scenario {
                id: seed.id.to_string(),
                title: seed.title.to_string(),
                cohort: seed.cohort,
                archetype: seed.archetype.to_string(),
                description: seed.description.to_string(),
            })
            .collect(),
    )
});

/// Immutable, ordered set of valid scenarios. Lookup and filtering only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    /// The catalog shipped with the portal.
    pub fn builtin() -> &'static ScenarioCatalog {
        &BUILTIN
    }

    /// Scenarios in catalog order, optionally restricted to one cohort.
    /// A filter that matches nothing yields an empty list.
    pub fn list(&self, cohort: Option<Cohort>) -> Vec<&Scenario> {
        self.scenarios
            .iter()
            .filter(|s| cohort.is_none_or(|c| s.cohort == c))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn list_builtin(cohort: Option<Cohort>) -> Vec<Scenario> {
        ScenarioCatalog::builtin()
            .list(cohort)
            .into_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn filter_by_cohort_returns_only_that_cohort() {
        let a = list_builtin(Some(Cohort::A));
        assert!(!a.is_empty());
        assert!(a.iter().all(|s| s.cohort == Cohort::A));

        let b = list_builtin(Some(Cohort::B));
        assert!(!b.is_empty());
        assert!(b.iter().all(|s| s.cohort == Cohort::B));
    }

    #[test]
    fn unfiltered_listing_is_full_catalog_in_stable_order() {
        let first = list_builtin(None);
        let second = list_builtin(None);
        assert_eq!(first.len(), ScenarioCatalog::builtin().scenarios.len());
        assert_eq!(first, second);
        assert_eq!(first[0].id, "CENARIO_A1");
    }

    #[test]
    fn scenario_ids_are_unique() {
        let ids: HashSet<_> = list_builtin(None).into_iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), ScenarioCatalog::builtin().scenarios.len());
    }

    #[test]
    fn filter_matching_nothing_is_empty() {
        let catalog = ScenarioCatalog::new(vec![Scenario {
            id: "ONLY_A".to_string(),
            title: "t".to_string(),
            cohort: Cohort::A,
            archetype: "a".to_string(),
            description: "d".to_string(),
        }]);
        assert!(catalog.list(Some(Cohort::B)).is_empty());
        assert_eq!(catalog.list(None).len(), 1);
    }

    #[test]
    fn cohort_parses_case_insensitively() {
        assert_eq!("a".parse::<Cohort>(), Ok(Cohort::A));
        assert_eq!(" B ".parse::<Cohort>(), Ok(Cohort::B));
        assert!("C".parse::<Cohort>().is_err());
    }

    #[test]
    fn scenario_serializes_with_portuguese_keys() {
        let scenario = ScenarioCatalog::builtin().get("CENARIO_A1").cloned();
        let value = serde_json::to_value(scenario).unwrap();
        assert_eq!(value["turma"], "A");
        assert!(value.get("titulo").is_some());
        assert!(value.get("arquetipo").is_some());
    }
}
