//! Built-in prompt definitions.
//!
//! Used whenever the workspace has no override file with the same id.

use metalrag_core::{AppError, AppResult};

use crate::types::PromptDefinition;

pub const QA_PROMPT_ID: &str = "metalrag.qa";
pub const GENERATOR_PROMPT_ID: &str = "metalrag.hypothesis.generator";
pub const CRITIC_PROMPT_ID: &str = "metalrag.hypothesis.critic";

pub const BUILTIN_PROMPT_IDS: [&str; 3] = [QA_PROMPT_ID, GENERATOR_PROMPT_ID, CRITIC_PROMPT_ID];

const QA_YAML: &str = r#"
id: metalrag.qa
title: Ответ на вопрос по базе статей
apiVersion: "1.0"
createdBy: metalrag
behavior:
  tone: technical
  style: concise
system: >-
  Ты эксперт-металлург, специалист по внепечной обработке и чистоте стали.
  Отвечай только на основе предоставленного контекста. Если в контексте нет
  ответа, прямо скажи об этом.
input:
  variables: [context, question]
template: |
  КОНТЕКСТ:
  {{context}}

  ВОПРОС: {{question}}

  ОТВЕТ:
output:
  format: text
"#;

const GENERATOR_YAML: &str = r#"
id: metalrag.hypothesis.generator
title: Генерация исследовательских гипотез
apiVersion: "1.0"
createdBy: metalrag
behavior:
  tone: technical
  style: detailed
system: >-
  Ты ведущий исследователь в области металлургии стали. Предлагаешь
  проверяемые гипотезы, опираясь на данные из научных статей.
input:
  variables: [problem, context]
template: |
  Сгенерируй 3–5 проверяемых (testable) гипотез с количественными параметрами
  (%, °C, ppm, время выдержки).

  ПРОБЛЕМА: {{problem}}

  ДАННЫЕ ИЗ СТАТЕЙ:
  {{context}}

  Формат ответа: нумерованный список, один пункт на гипотезу.
  ГИПОТЕЗЫ (1. [Название] → эффект + механизм + параметры):
output:
  format: numbered-list
"#;

const CRITIC_YAML: &str = r#"
id: metalrag.hypothesis.critic
title: Критика и отбор гипотез
apiVersion: "1.0"
createdBy: metalrag
behavior:
  tone: critical
  style: concise
system: >-
  Ты строгий рецензент металлургических исследований. Оцениваешь гипотезы
  по обоснованности данными, проверяемости и практической ценности.
input:
  variables: [raw_hypotheses, context]
template: |
  Ниже гипотезы, предложенные для исследования, и данные из статей.

  ГИПОТЕЗЫ:
  {{raw_hypotheses}}

  ДАННЫЕ ИЗ СТАТЕЙ:
  {{context}}

  Отбрось слабые и плохо обоснованные гипотезы. Оставь не более 3 лучших,
  упорядочив их по убыванию ценности. Для каждой кратко укажи, чем она
  подкреплена в данных.
  Формат ответа: нумерованный список.
  ИТОГОВЫЕ ГИПОТЕЗЫ:
output:
  format: numbered-list
"#;

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> AppResult<Option<PromptDefinition>> {
    let yaml = match id {
        QA_PROMPT_ID => QA_YAML,
        GENERATOR_PROMPT_ID => GENERATOR_YAML,
        CRITIC_PROMPT_ID => CRITIC_YAML,
        _ => return Ok(None),
    };

    let definition: PromptDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| AppError::Prompt(format!("Built-in prompt '{}' is invalid: {}", id, e)))?;
    Ok(Some(definition))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_parse_with_matching_ids() {
        for id in BUILTIN_PROMPT_IDS {
            let def = builtin_prompt(id).unwrap().unwrap();
            assert_eq!(def.id, id);
            assert!(!def.input.variables.is_empty());
            for var in &def.input.variables {
                assert!(
                    def.template.contains(&format!("{{{{{}}}}}", var)),
                    "{} does not use {}",
                    id,
                    var
                );
            }
        }
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("agent.ask.default").unwrap().is_none());
    }
}
