use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use daq_control::{ControlConfig, DecodedResponse, DeploymentController, RpcError};
use daq_process::{Component, Script};

#[derive(Debug, Parser)]
#[command(name = "daqctl", version, about = "Control a supervised DAQ deployment")]
struct Cli {
    /// Deployment description: JSON object with `components` and `scripts`.
    #[arg(short, long)]
    deployment: Option<PathBuf>,

    /// Supervisor group (default: $DAQ_GROUP or "daqling").
    #[arg(short, long)]
    group: Option<String>,

    /// Restrict the command to these components.
    #[arg(short = 'c', long = "component")]
    only: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register component processes without starting them.
    Add,
    /// Register auxiliary scripts.
    AddScripts,
    /// Start registered component processes.
    Boot,
    /// Remove component processes and the given extra processes per host.
    Remove {
        #[arg(long)]
        extra: Vec<String>,
    },
    Configure,
    Unconfigure,
    Start {
        #[arg(long, default_value_t = 0)]
        run: u32,
    },
    Stop,
    Shutdown,
    /// Send a custom command to each component.
    Custom { name: String, arg: Option<String> },
    Status,
    /// List process ids of the group on a host.
    Pids { host: String },
}

#[derive(Debug, Default, serde::Deserialize)]
struct Deployment {
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    scripts: Vec<Script>,
}

fn load_deployment(path: Option<&Path>, only: &[String]) -> anyhow::Result<Deployment> {
    let path = path.ok_or_else(|| anyhow::anyhow!("--deployment is required for this command"))?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read deployment {}", path.display()))?;
    let mut d: Deployment = serde_json::from_str(&raw)
        .with_context(|| format!("parse deployment {}", path.display()))?;
    if !only.is_empty() {
        d.components.retain(|c| only.contains(&c.name));
        d.scripts.retain(|s| only.contains(&s.name));
    }
    Ok(d)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints each reply; fails if any component did not succeed.
fn report(
    results: Vec<(String, Result<DecodedResponse, RpcError>)>,
) -> anyhow::Result<()> {
    let mut failed = Vec::new();
    for (name, res) in results {
        match res {
            Ok(reply) => {
                if !reply.is_success() {
                    failed.push(name.clone());
                }
                print_json(&serde_json::json!({ "component": name, "reply": reply }))?;
            }
            Err(e) => {
                tracing::error!(component = %name, error = %e, "command failed");
                failed.push(name);
            }
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("command failed for: {}", failed.join(", "))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ControlConfig::from_env();
    if let Some(group) = cli.group.clone() {
        config = config.with_group(group);
    }
    tracing::debug!(group = %config.group, port = config.supervisor_port, "daqctl starting");
    let controller = DeploymentController::grpc(config);

    let d = match cli.command {
        Command::Pids { .. } => Deployment::default(),
        _ => load_deployment(cli.deployment.as_deref(), &cli.only)?,
    };
    let components = &d.components;

    match cli.command {
        Command::Add => {
            let logs = controller.add_components(components).await;
            print_json(&logs)?;
            if logs.len() != components.len() {
                anyhow::bail!("{} of {} components added", logs.len(), components.len());
            }
        }
        Command::AddScripts => {
            let logs = controller.add_scripts(&d.scripts).await;
            print_json(&logs)?;
        }
        Command::Boot => {
            let booted = controller.boot_components(components).await;
            print_json(&booted)?;
        }
        Command::Remove { extra } => controller.remove_components(components, &extra).await,
        Command::Status => {
            for c in components {
                let status = controller.get_status(c).await;
                print_json(&serde_json::json!({ "component": c.name, "modules": status.entries }))?;
            }
        }
        Command::Configure => {
            let mut results = Vec::new();
            for c in components {
                results.push((c.name.clone(), controller.configure(c).await));
            }
            report(results)?;
        }
        Command::Unconfigure => {
            let mut results = Vec::new();
            for c in components {
                results.push((c.name.clone(), controller.unconfigure(c).await));
            }
            report(results)?;
        }
        Command::Start { run } => {
            let mut results = Vec::new();
            for c in components {
                results.push((c.name.clone(), controller.start(c, run).await));
            }
            report(results)?;
        }
        Command::Stop => {
            let mut results = Vec::new();
            for c in components {
                results.push((c.name.clone(), controller.stop(c).await));
            }
            report(results)?;
        }
        Command::Shutdown => {
            let mut results = Vec::new();
            for c in components {
                results.push((c.name.clone(), controller.shutdown(c).await));
            }
            report(results)?;
        }
        Command::Custom { name, arg } => {
            let mut results = Vec::new();
            for c in components {
                results.push((
                    c.name.clone(),
                    controller.custom(c, &name, arg.as_deref()).await,
                ));
            }
            report(results)?;
        }
        Command::Pids { host } => {
            let pids = controller.process_ids(&host).await?;
            print_json(&pids)?;
        }
    }

    Ok(())
}
