//! `agentloop run | stream | chat`: drive the agent from the terminal.

use std::io::Write;
use std::path::Path;

use agentloop_agent::Agent;
use agentloop_config::AppConfig;
use agentloop_tools::tasks::task_analysis_schema;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::render::Renderer;
use crate::commands::{ToolSet, load_config};

/// Build the agent described by the config file and the chosen tool set.
pub fn build_agent(
    config: &AppConfig,
    toolset: ToolSet,
    analyze_tasks: bool,
) -> Result<Agent, Box<dyn std::error::Error>> {
    let provider = agentloop_providers::build_from_config(config).map_err(|e| {
        if !config.has_api_key() {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    AGENTLOOP_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
        }
        format!("Failed to configure provider: {e}")
    })?;

    let toolset = if analyze_tasks && toolset == ToolSet::Demo {
        ToolSet::Tasks
    } else {
        toolset
    };

    let mut builder = Agent::builder(&config.agent.name, &config.agent.instructions)
        .provider(provider)
        .registry(toolset.registry())
        .config(config.agent_config());
    if analyze_tasks {
        builder = builder.output_schema(task_analysis_schema());
    }
    Ok(builder.build()?)
}

pub async fn run(
    config_path: Option<&Path>,
    toolset: ToolSet,
    input: &str,
    analyze_tasks: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let agent = build_agent(&config, toolset, analyze_tasks)?;

    eprint!("  Thinking...");
    let output = agent.arun(input).await;
    eprint!("\r              \r");

    let output = output?;
    if output.is_iteration_limit() {
        eprintln!("  [warning] {output}");
    } else {
        println!("{output}");
    }
    Ok(())
}

pub async fn stream(config_path: Option<&Path>, toolset: ToolSet, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let agent = build_agent(&config, toolset, false)?;
    stream_once(&agent, input).await
}

async fn stream_once(agent: &Agent, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut renderer = Renderer::new();
    let mut stdout = std::io::stdout();
    let mut events = Box::pin(agent.astream(input));
    while let Some(event) = events.next().await {
        renderer.render(&event, &mut stdout)?;
    }
    Ok(())
}

pub async fn chat(config_path: Option<&Path>, toolset: ToolSet) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let agent = build_agent(&config, toolset, false)?;

    println!();
    println!("  agentloop: interactive mode");
    println!();
    println!("  Agent:     {}", agent.name());
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!();
    println!("  Each message starts a fresh run. Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        println!();
        stream_once(&agent, line).await?;
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
