//! `advisor session` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::ScriptedAnalyzer;
use crate::application::TurnResponse;
use crate::cli::commands::{build_coordinator, open_repository};
use crate::cli::output::{action_success, list_table, output, render_list, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{Config, ConstraintCategory, ConversationState, Module0Context};
use crate::domain::ports::ConversationRepository;

const PERSISTENCE_RETRY_MESSAGE: &str =
    "The conversation could not be saved. Please send your message again.";

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Start a new session from intake answers
    Start {
        /// Business name
        #[arg(long, default_value = "")]
        business_name: String,
        /// Business stage (e.g. idea, early, growth)
        #[arg(long, default_value = "")]
        stage: String,
        /// The challenge as the owner described it
        #[arg(long, default_value = "")]
        challenge: String,
        /// Constraint the owner believes is primary (strategy, execution, energy)
        #[arg(long)]
        self_reported: Option<String>,
    },
    /// Process one user message
    Turn {
        /// Session ID
        id: Uuid,
        /// The user's message
        #[arg(short, long)]
        message: String,
        /// Analysis of the message as JSON
        #[arg(short, long, conflicts_with = "analysis_file")]
        analysis: Option<String>,
        /// File holding the analysis JSON
        #[arg(long)]
        analysis_file: Option<PathBuf>,
    },
    /// Show the state of a session
    Show {
        /// Session ID
        id: Uuid,
    },
    /// List recently updated sessions
    List {
        /// Maximum number of sessions to display
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Delete a session
    Delete {
        /// Session ID
        id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct SessionOutput {
    pub id: Uuid,
    pub version: u64,
    pub phase: String,
    pub turns_total: u32,
    pub turns_in_phase: u32,
    pub constraint_category: Option<String>,
    pub hypothesis: Option<String>,
    pub clarity: f64,
    pub confidence: f64,
    pub capacity: f64,
    pub business_name: String,
    pub components_shown: Vec<String>,
    pub updated_at: String,
}

impl From<&ConversationState> for SessionOutput {
    fn from(state: &ConversationState) -> Self {
        Self {
            id: state.session_id,
            version: state.version,
            phase: state.phase.to_string(),
            turns_total: state.turns_total,
            turns_in_phase: state.turns_in_phase,
            constraint_category: state.constraint_category.map(|c| c.to_string()),
            hypothesis: state.hypothesis.map(|c| c.to_string()),
            clarity: state.scores.clarity,
            confidence: state.scores.confidence,
            capacity: state.scores.capacity,
            business_name: state.module0_context.business_name.clone(),
            components_shown: state.component_flags.iter().map(|c| c.to_string()).collect(),
            updated_at: state.updated_at.to_rfc3339(),
        }
    }
}

impl CommandOutput for SessionOutput {
    fn to_human(&self) -> String {
        let none = || "-".to_string();
        let mut lines = vec![
            format!("Session: {}", self.id),
            format!("Phase: {} (turn {} in phase)", self.phase, self.turns_in_phase),
            format!("Turns: {}", self.turns_total),
            format!(
                "Constraint: {}",
                self.constraint_category.clone().unwrap_or_else(none)
            ),
            format!("Hypothesis: {}", self.hypothesis.clone().unwrap_or_else(none)),
            format!(
                "Scores: clarity {:.2}, confidence {:.2}, capacity {:.2}",
                self.clarity, self.confidence, self.capacity
            ),
        ];
        if !self.business_name.is_empty() {
            lines.push(format!("Business: {}", self.business_name));
        }
        if !self.components_shown.is_empty() {
            lines.push(format!("Shown: {}", self.components_shown.join(", ")));
        }
        lines.push(format!("Version: {}", self.version));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SessionListOutput {
    pub sessions: Vec<SessionOutput>,
    pub total: usize,
}

impl CommandOutput for SessionListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "phase", "turns", "constraint", "updated"]);
        for session in &self.sessions {
            table.add_row(vec![
                session.id.to_string(),
                session.phase.clone(),
                session.turns_total.to_string(),
                session.constraint_category.clone().unwrap_or_default(),
                session.updated_at.clone(),
            ]);
        }
        render_list("session", &table, self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TurnOutput {
    #[serde(flatten)]
    pub response: TurnResponse,
}

impl CommandOutput for TurnOutput {
    fn to_human(&self) -> String {
        let r = &self.response;
        let mut lines = vec![format!(
            "Turn {} | phase {} | action {} ({})",
            r.turn, r.phase, r.action, r.rule
        )];
        if let Some(t) = r.transition {
            lines.push(format!("Transition: {} -> {}", t.from, t.to));
        }
        lines.push(String::new());
        lines.push(r.reply.clone());
        for component in &r.components {
            lines.push(String::new());
            if component.text.is_empty() {
                lines.push(format!("[{}]", component.component_type));
            } else {
                lines.push(format!("[{}] {}", component.component_type, component.text));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SessionActionOutput {
    pub success: bool,
    pub message: String,
}

impl CommandOutput for SessionActionOutput {
    fn to_human(&self) -> String {
        action_success(&self.message)
    }
}

pub async fn execute(args: SessionArgs, config: &Config, json_mode: bool) -> Result<()> {
    let repository = open_repository(config).await?;

    match args.command {
        SessionCommands::Start {
            business_name,
            stage,
            challenge,
            self_reported,
        } => {
            let self_reported_constraint = self_reported
                .map(|raw| raw.parse::<ConstraintCategory>())
                .transpose()
                .map_err(anyhow::Error::msg)
                .context("Invalid --self-reported")?;

            let coordinator = build_coordinator(
                config,
                repository,
                Arc::new(ScriptedAnalyzer::default()),
            )?;
            let state = coordinator
                .start_session(Module0Context {
                    business_name,
                    business_stage: stage,
                    stated_challenge: challenge,
                    self_reported_constraint,
                })
                .await?;
            output(&SessionOutput::from(&state), json_mode);
        }

        SessionCommands::Turn {
            id,
            message,
            analysis,
            analysis_file,
        } => {
            let raw = match (analysis, analysis_file) {
                (Some(raw), _) => Some(raw),
                (None, Some(path)) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                (None, None) => None,
            };
            let analyzer = raw.map_or_else(ScriptedAnalyzer::default, |raw| {
                ScriptedAnalyzer::from_json(&raw)
            });

            let coordinator = build_coordinator(config, repository, Arc::new(analyzer))?;
            let response = match coordinator.process_turn(id, &message).await {
                Ok(response) => response,
                Err(e) if e.is_persistence_failure() => {
                    return Err(anyhow::Error::new(e).context(PERSISTENCE_RETRY_MESSAGE));
                }
                Err(e) => return Err(e.into()),
            };
            output(&TurnOutput { response }, json_mode);
        }

        SessionCommands::Show { id } => {
            let state = repository
                .get(id)
                .await?
                .ok_or(DomainError::SessionNotFound(id))?;
            output(&SessionOutput::from(&state), json_mode);
        }

        SessionCommands::List { limit } => {
            let states = repository.list(limit).await?;
            let sessions: Vec<SessionOutput> = states.iter().map(SessionOutput::from).collect();
            let total = sessions.len();
            output(&SessionListOutput { sessions, total }, json_mode);
        }

        SessionCommands::Delete { id } => {
            repository.delete(id).await?;
            output(
                &SessionActionOutput {
                    success: true,
                    message: format!("Deleted session {id}"),
                },
                json_mode,
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        Action, ComponentType, DecisionRule, Phase, PhaseTransition, RenderedComponent,
    };
    use std::collections::BTreeMap;

    #[test]
    fn test_session_output_from_state() {
        let mut state = ConversationState::new(
            Module0Context {
                business_name: "Harbor Bakery".to_string(),
                ..Default::default()
            },
            3,
        );
        state.phase = Phase::CrossMapping;
        state.constraint_category = Some(ConstraintCategory::Execution);
        state.component_flags.mark_shown(ComponentType::SummaryCard);

        let out = SessionOutput::from(&state);
        assert_eq!(out.phase, "cross_mapping");
        assert_eq!(out.constraint_category.as_deref(), Some("execution"));
        assert_eq!(out.components_shown, vec!["summary_card".to_string()]);

        let human = out.to_human();
        assert!(human.contains("Constraint: execution"));
        assert!(human.contains("Hypothesis: -"));
        assert!(human.contains("Business: Harbor Bakery"));
    }

    #[test]
    fn test_turn_output_lists_components() {
        let out = TurnOutput {
            response: TurnResponse {
                session_id: Uuid::new_v4(),
                turn: 8,
                phase: Phase::Closing,
                action: Action::ReflectAssisted,
                rule: DecisionRule::ClosingScript,
                transition: Some(PhaseTransition {
                    from: Phase::BlockerCheck,
                    to: Phase::Closing,
                }),
                reply: "Here is where we landed.".to_string(),
                components: vec![
                    RenderedComponent {
                        component_type: ComponentType::SummaryCard,
                        text: "Your constraint is execution.".to_string(),
                        metadata: BTreeMap::new(),
                    },
                    RenderedComponent {
                        component_type: ComponentType::ProgressIndicator,
                        text: String::new(),
                        metadata: BTreeMap::new(),
                    },
                ],
            },
        };

        let human = out.to_human();
        assert!(human.contains("Transition: blocker_check -> closing"));
        assert!(human.contains("[summary_card] Your constraint is execution."));
        assert!(human.contains("[progress_indicator]"));

        let json = out.to_json();
        assert_eq!(json["turn"], 8);
        assert_eq!(json["reply"], "Here is where we landed.");
    }
}
