//! Agents command - show the dispatch table.

use crate::agents::{AgentRegistry, JobRequest};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use anyhow::Result;
use console::style;

/// List every task, or the plan for one request.
pub fn run_agents(plan: Option<&str>, settings: &Settings) -> Result<()> {
    let prompts = Prompts::for_settings(settings)?;
    let registry = AgentRegistry::standard(&prompts.agents);

    if let Some(input) = plan {
        let request = JobRequest::classify(input)?;
        Output::header("Task plan");
        println!("{}", serde_json::to_string(&request.envelope())?);
        println!();
        for (i, spec) in registry.route(&request).iter().enumerate() {
            println!("  {} {}", style(format!("{}.", i + 1)).cyan(), style(spec.name).bold());
        }
        return Ok(());
    }

    Output::header("Manager");
    println!("  {}", registry.manager_instruction());

    Output::header("Tasks");
    for spec in registry.specs() {
        let llm = if spec.kind.uses_llm() { " [llm]" } else { "" };
        println!("  {}{} - {}", style(spec.name).bold(), style(llm).dim(), spec.description);
    }

    Ok(())
}
