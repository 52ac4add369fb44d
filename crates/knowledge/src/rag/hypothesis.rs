//! Two-step hypothesis workflow: generate candidates, then critique them.
//!
//! Each step consumes the previous step's output type, so the critic can
//! only run on a completed generation:
//!
//! ```text
//! QueryContext -> RawHypotheses -> CritiqueInput -> FinalHypotheses
//! ```

use crate::rag::completion::complete_prompt;
use crate::rag::types::{QueryContext, RoleSettings};
use metalrag_core::AppResult;
use metalrag_llm::LlmClient;
use metalrag_prompt::PromptDefinition;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Item count the generator is asked for.
const EXPECTED_RAW_ITEMS: RangeInclusive<usize> = 3..=5;

/// Generator output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHypotheses {
    pub text: String,
    pub items: usize,
}

/// Everything the critic sees.
#[derive(Debug, Clone, Copy)]
pub struct CritiqueInput<'a> {
    pub raw: &'a RawHypotheses,
    pub context: &'a QueryContext,
}

/// Critic output, the terminal result.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalHypotheses {
    pub text: String,
    pub items: usize,
}

pub struct HypothesisWorkflow<'a> {
    llm: &'a dyn LlmClient,
    generator_prompt: &'a PromptDefinition,
    critic_prompt: &'a PromptDefinition,
    generator: &'a RoleSettings,
    critic: &'a RoleSettings,
}

impl<'a> HypothesisWorkflow<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        generator_prompt: &'a PromptDefinition,
        critic_prompt: &'a PromptDefinition,
        generator: &'a RoleSettings,
        critic: &'a RoleSettings,
    ) -> Self {
        Self {
            llm,
            generator_prompt,
            critic_prompt,
            generator,
            critic,
        }
    }

    /// Ask the generator role for candidate hypotheses.
    pub async fn generate(&self, problem: &str, context: &QueryContext) -> AppResult<RawHypotheses> {
        let mut variables = HashMap::new();
        variables.insert("problem".to_string(), problem.to_string());
        variables.insert("context".to_string(), context.text.clone());

        let text = complete_prompt(
            self.llm,
            self.generator_prompt,
            &variables,
            self.generator,
            "hypothesis generation",
        )
        .await?;

        let items = parse_numbered_items(&text);
        if !EXPECTED_RAW_ITEMS.contains(&items) {
            tracing::warn!(items, "Generator returned an unexpected number of hypotheses");
        }
        tracing::info!(items, "Generated raw hypotheses");

        Ok(RawHypotheses { text, items })
    }

    /// Ask the critic role to narrow and rank the raw hypotheses.
    pub async fn critique(&self, input: CritiqueInput<'_>) -> AppResult<FinalHypotheses> {
        let mut variables = HashMap::new();
        variables.insert("raw_hypotheses".to_string(), input.raw.text.clone());
        variables.insert("context".to_string(), input.context.text.clone());

        let text = complete_prompt(
            self.llm,
            self.critic_prompt,
            &variables,
            self.critic,
            "hypothesis critique",
        )
        .await?;

        let items = parse_numbered_items(&text);
        if items > input.raw.items {
            tracing::warn!(
                final_items = items,
                raw_items = input.raw.items,
                "Critic returned more hypotheses than it was given"
            );
        }
        tracing::info!(items, "Critiqued hypotheses");

        Ok(FinalHypotheses { text, items })
    }

    /// Generate then critique. Any failure aborts the whole run.
    pub async fn run(
        &self,
        problem: &str,
        context: &QueryContext,
    ) -> AppResult<(RawHypotheses, FinalHypotheses)> {
        let raw = self.generate(problem, context).await?;
        let final_set = self
            .critique(CritiqueInput {
                raw: &raw,
                context,
            })
            .await?;
        Ok((raw, final_set))
    }
}

/// Count lines that start a numbered list item (`1.`, `2)`, `**3.`, `### 4.`).
pub fn parse_numbered_items(text: &str) -> usize {
    text.lines().filter(|line| is_numbered_item(line)).count()
}

fn is_numbered_item(line: &str) -> bool {
    let rest = line.trim_start().trim_start_matches(['*', '#', '_', ' ']);
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    matches!(rest[digits..].chars().next(), Some('.') | Some(')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbered_list() {
        let text = "1. Ti 0.015%\n2. Ca/Al 0.10\n3. Argon 5 min\n";
        assert_eq!(parse_numbered_items(text), 3);
    }

    #[test]
    fn test_parse_markdown_variants() {
        let text = "**1. Титан** → TiN\n  2) Кальций\n### 3. Аргон\n- not an item\nВывод: 2.5% Ti";
        assert_eq!(parse_numbered_items(text), 3);
    }

    #[test]
    fn test_numbers_without_marker_are_not_items() {
        assert_eq!(parse_numbered_items("1600 °C\n2024 год\n"), 0);
        assert_eq!(parse_numbered_items(""), 0);
    }
}
