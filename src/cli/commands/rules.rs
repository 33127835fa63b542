//! `advisor rules` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, TriggerPoint};
use crate::infrastructure::config::load_component_registry;

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// List component rules in evaluation order
    List {
        /// Only rules for this trigger point (after_response, phase_transition, session_complete)
        #[arg(short, long)]
        trigger: Option<String>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct RuleOutput {
    pub name: String,
    pub trigger: String,
    pub component: String,
    pub priority: i32,
    pub single_use: bool,
    pub text: String,
}

#[derive(Debug, serde::Serialize)]
pub struct RuleListOutput {
    pub rules: Vec<RuleOutput>,
    pub total: usize,
}

impl CommandOutput for RuleListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["trigger", "priority", "name", "component", "once", "text"]);
        for rule in &self.rules {
            table.add_row(vec![
                rule.trigger.clone(),
                rule.priority.to_string(),
                rule.name.clone(),
                rule.component.clone(),
                if rule.single_use { "yes" } else { "" }.to_string(),
                truncate(&rule.text, 40),
            ]);
        }
        render_list("rule", &table, self.total)
    }
}

pub fn execute(args: RulesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let registry = load_component_registry(&config.components)?;

    match args.command {
        RulesCommands::List { trigger } => {
            let triggers = match trigger {
                Some(raw) => vec![raw
                    .parse::<TriggerPoint>()
                    .map_err(anyhow::Error::msg)
                    .context("Invalid --trigger")?],
                None => TriggerPoint::ALL.to_vec(),
            };

            let rules: Vec<RuleOutput> = triggers
                .into_iter()
                .flat_map(|t| registry.rules_for(t).iter())
                .map(|rule| RuleOutput {
                    name: rule.name.clone(),
                    trigger: rule.trigger.to_string(),
                    component: rule.component.to_string(),
                    priority: rule.priority,
                    single_use: registry
                        .policy_for(rule.component)
                        .is_some_and(|p| p.is_single_use()),
                    text: rule.text.clone(),
                })
                .collect();

            let total = rules.len();
            output(&RuleListOutput { rules, total }, json_mode);
        }
    }
    Ok(())
}
