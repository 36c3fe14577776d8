use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use replay_orchestrator::cli::{Cli, Command};
use replay_orchestrator::client::CoordinatorClient;
use replay_orchestrator::config::OrchestratorConfig;
use replay_orchestrator::manifest::{ConfigRegistry, NO_CHANGE, SnapshotList, manifest_files};
use replay_orchestrator::orchestrator::ReplayOrchestrator;
use replay_orchestrator::state_machine::{JobPatch, JobStateMachine, VersionTag};
use replay_orchestrator::ui::SummaryView;
use replay_orchestrator::{logging, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let view = SummaryView::new();

    match cli.command {
        Command::Serve {
            config,
            manifest,
            host,
            port,
        } => {
            let mut cfg = OrchestratorConfig::load(config.as_deref())?;
            if let Some(manifest) = manifest {
                cfg.manifest_path = Some(manifest);
            }
            if let Some(host) = host {
                cfg.host = host;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            logging::init_tracing(if cli.verbose { "debug" } else { cfg.log_level.as_str() });

            let Some(manifest_path) = cfg.manifest_path.clone() else {
                bail!("no manifest configured; pass --manifest or set REPLAY_MANIFEST");
            };
            let orchestrator = ReplayOrchestrator::from_manifest(&manifest_path)
                .with_context(|| format!("loading manifest {}", manifest_path.display()))?;
            info!(
                manifest = %manifest_path.display(),
                jobs = orchestrator.jobs().len(),
                generation = %orchestrator.jobs().generation(),
                "Coordinator ready"
            );
            server::serve(cfg.bind_addr()?, Arc::new(orchestrator)).await?;
        }
        Command::Validate { manifest } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "warn" });
            let registry = ConfigRegistry::load(&manifest)
                .with_context(|| format!("loading manifest {}", manifest.display()))?;
            view.print_slices(registry.slices());
            view.print_summary(&JobStateMachine::new(&registry).summary());
        }
        Command::SetVersion { manifest, version } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "info" });
            let mut registry = ConfigRegistry::load(&manifest)
                .with_context(|| format!("loading manifest {}", manifest.display()))?;
            if registry.set_target_version(&version) {
                registry.persist()?;
                println!("{} slices now target {version}", registry.len());
            } else {
                println!("version is {NO_CHANGE}, manifest unchanged");
            }
        }
        Command::GenerateManifest {
            snapshot_list,
            target_version,
            prefix,
            storage_type,
            output,
        } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "warn" });
            let names = std::fs::read_to_string(&snapshot_list)
                .with_context(|| format!("reading {}", snapshot_list.display()))?;
            let list = SnapshotList {
                prefix,
                storage_type,
                target_version,
            };
            let output_path = output.clone().unwrap_or_else(|| PathBuf::from("manifest.json"));
            let registry = list.registry(output_path, names.lines())?;
            match output {
                Some(path) => {
                    registry.persist()?;
                    println!("{} slices written to {}", registry.len(), path.display());
                }
                None => {
                    let records: Vec<_> = registry.slices().iter().map(|s| s.to_record()).collect();
                    println!("{}", serde_json::to_string_pretty(&records)?);
                }
            }
        }
        Command::ListManifests { dir } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "warn" });
            for path in manifest_files(&dir)? {
                println!("{}", path.display());
            }
        }
        Command::Status { url } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "warn" });
            let summary = CoordinatorClient::new(url)?.summary().await?;
            view.print_summary(&summary);
        }
        Command::NextJob { url } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "warn" });
            match CoordinatorClient::new(url)?.next_job().await? {
                Some(tagged) => view.print_tagged(&tagged),
                None => println!("no job available"),
            }
        }
        Command::Report {
            job_id,
            tag,
            status,
            last_block,
            url,
        } => {
            logging::init_tracing(if cli.verbose { "debug" } else { "warn" });
            let tag: VersionTag = tag.parse()?;
            let mut patch = JobPatch::new();
            if let Some(status) = status {
                patch = patch.update_status(status);
            }
            if let Some(block) = last_block {
                patch = patch.update_last_block(block);
            }
            if patch.is_empty() {
                bail!("nothing to report; pass --status or --last-block");
            }
            let next = CoordinatorClient::new(url)?
                .update_job(job_id, &tag, &patch)
                .await?;
            println!("job {job_id} updated, next tag {next}");
        }
    }

    Ok(())
}
