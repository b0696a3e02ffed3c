//! services/api/src/adapters/adviser_llm.rs
//!
//! This module contains the adapter for the one-shot generation calls: pathways,
//! programs and application plans. It implements the `PathwayGenerationService`,
//! `ProgramGenerationService` and `PlanGenerationService` ports from the `core` crate.

const PATHWAY_INSTRUCTIONS: &str = r#"You are an education adviser. Based on the user's profile, suggest 3 to 5 broad education pathways (directions of study such as "Data Science" or "Nursing"), not specific programs.

Respond with a JSON object of exactly this shape:
{"pathways": [{"title": string, "description": string, "category": string, "duration": string, "cost_range": string, "outcomes": [string]}]}

- "duration" is a typical time to completion, e.g. "2-4 years".
- "cost_range" is a typical total cost range in the user's region when known.
- "outcomes" lists 2 to 4 career outcomes."#;

const PROGRAM_INSTRUCTIONS: &str = r#"You are an education adviser. Find 3 to 6 real, currently offered programs that belong to the given pathway and fit the user's profile. Use web search to confirm the programs exist and to find current costs and deadlines.

Respond with a JSON object of exactly this shape:
{"programs": [{"name": string, "institution": string, "degree_type": string, "duration": string, "cost": string, "location": string, "start_date": string, "application_deadline": string, "requirements": [string], "highlights": [string], "description": string, "website": string, "match_score": number, "match_reasons": [string]}]}

- "match_score" is 0 to 100 and reflects how well the program fits this user.
- Use null for any field you could not verify."#;

const PLAN_INSTRUCTIONS: &str = r#"You are an admissions coach. Build an application plan for the given program and user.

Respond with a JSON object of exactly this shape:
{"deadline": "YYYY-MM-DD" or null, "summary": string, "tasks": [{"title": string, "description": string, "due_date": "YYYY-MM-DD" or null}], "timeline": [{"title": string, "date": "YYYY-MM-DD" or null, "description": string}]}

- "tasks" is an ordered checklist (documents, tests, essays, references, fees, submission), 5 to 12 items, earliest first.
- "timeline" holds the key milestones (application opens, deadline, decision, enrollment).
- Dates must be in the future relative to today and before the program deadline when known."#;

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use vista_core::domain::{ApplicationPlan, NewPathway, NewProgram, Pathway, Recommendation};
use vista_core::ports::{
    PathwayGenerationService, PlanGenerationService, PortError, PortResult,
    ProgramGenerationService,
};

use super::{output_text, port_error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the generation ports using the OpenAI Responses API.
#[derive(Clone)]
pub struct OpenAiAdviserAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

#[derive(Deserialize)]
struct PathwaysEnvelope {
    #[serde(default)]
    pathways: Vec<NewPathway>,
}

#[derive(Deserialize)]
struct ProgramsEnvelope {
    #[serde(default)]
    programs: Vec<NewProgram>,
}

impl OpenAiAdviserAdapter {
    /// Creates a new `OpenAiAdviserAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Runs one JSON-mode request and decodes the answer into `T`.
    async fn generate_json<T: DeserializeOwned>(
        &self,
        instructions: &str,
        input: String,
        tools: Value,
    ) -> PortResult<T> {
        let request = json!({
            "model": self.model,
            "instructions": instructions,
            "input": input,
            "tools": tools,
            "text": {"format": {"type": "json_object"}},
        });

        let response: Value = self
            .client
            .responses()
            .create_byot(request)
            .await
            .map_err(port_error)?;

        let raw = output_text(&response);
        debug!("Generation answer: {}", raw);
        parse_json_answer(&raw)
    }
}

/// Decodes a JSON answer, tolerating a surrounding markdown code fence.
fn parse_json_answer<T: DeserializeOwned>(raw: &str) -> PortResult<T> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim()).map_err(|e| {
        warn!("LLM returned malformed JSON: {}", e);
        PortError::Unexpected(format!("LLM returned malformed JSON: {}", e))
    })
}

//=========================================================================================
// Generation Trait Implementations
//=========================================================================================

#[async_trait]
impl PathwayGenerationService for OpenAiAdviserAdapter {
    async fn generate_pathways(&self, profile_summary: &str) -> PortResult<Vec<NewPathway>> {
        let input = format!("USER PROFILE:\n{}", profile_summary);
        let envelope: PathwaysEnvelope = self
            .generate_json(PATHWAY_INSTRUCTIONS, input, json!([]))
            .await?;
        Ok(envelope.pathways)
    }
}

#[async_trait]
impl ProgramGenerationService for OpenAiAdviserAdapter {
    async fn generate_programs(
        &self,
        profile_summary: &str,
        pathway: &Pathway,
    ) -> PortResult<Vec<NewProgram>> {
        let input = format!(
            "USER PROFILE:\n{}\n\nPATHWAY:\n{}\n{}",
            profile_summary, pathway.title, pathway.description
        );
        let envelope: ProgramsEnvelope = self
            .generate_json(PROGRAM_INSTRUCTIONS, input, json!([{"type": "web_search"}]))
            .await?;
        Ok(envelope
            .programs
            .into_iter()
            .map(|mut program| {
                program.match_score = program.match_score.clamp(0.0, 100.0);
                program
            })
            .collect())
    }
}

#[async_trait]
impl PlanGenerationService for OpenAiAdviserAdapter {
    async fn generate_plan(
        &self,
        profile_summary: &str,
        recommendation: &Recommendation,
    ) -> PortResult<ApplicationPlan> {
        let input = format!(
            "TODAY: {}\n\nUSER PROFILE:\n{}\n\nPROGRAM:\n{}",
            chrono::Utc::now().date_naive(),
            profile_summary,
            recommendation.program.search_document()
        );
        self.generate_json(PLAN_INSTRUCTIONS, input, json!([])).await
    }
}
