//! Interface de linha de comando do orquestrador de replay baseada em clap.
//!
//! Define a struct [`Cli`] com os subcomandos de [`Command`] e a flag global
//! `--verbose`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client::DEFAULT_URL;
use crate::manifest::StorageType;
use crate::state_machine::JobStatus;

/// Coordenador de jobs de replay de blocos.
#[derive(Debug, Parser)]
#[command(name = "replay-orchestrator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia o serviço HTTP que distribui jobs aos workers.
    Serve {
        /// Arquivo de configuração TOML.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Manifesto JSON; tem precedência sobre a configuração.
        #[arg(long)]
        manifest: Option<PathBuf>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Carrega um manifesto e mostra suas fatias.
    Validate {
        manifest: PathBuf,
    },

    /// Define a versão alvo de todas as fatias e regrava o manifesto.
    SetVersion {
        manifest: PathBuf,

        /// Nova versão, ou "nochange" para manter a atual.
        version: String,
    },

    /// Gera um manifesto a partir de uma lista de nomes de snapshot, um por linha.
    GenerateManifest {
        snapshot_list: PathBuf,

        /// Versão alvo de todas as fatias geradas.
        #[arg(long)]
        target_version: String,

        /// Prefixo do local dos snapshots, por exemplo `s3://bucket/snapshots/`.
        #[arg(long, default_value = "")]
        prefix: String,

        #[arg(long, default_value = "s3", value_parser = parse_storage_type)]
        storage_type: StorageType,

        /// Arquivo de saída; sem ele o manifesto vai para a saída padrão.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Lista os manifestos candidatos de um diretório para um restart.
    ListManifests {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Mostra o resumo de um coordenador em execução.
    Status {
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },

    /// Reivindica o próximo job disponível.
    NextJob {
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },

    /// Envia o progresso de um job usando a tag obtida na reivindicação.
    Report {
        #[arg(long)]
        job_id: usize,

        #[arg(long)]
        tag: String,

        #[arg(long, value_parser = parse_status)]
        status: Option<JobStatus>,

        #[arg(long)]
        last_block: Option<u64>,

        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
}

fn parse_status(raw: &str) -> Result<JobStatus, String> {
    raw.parse().map_err(|e: crate::error::ReplayError| e.to_string())
}

fn parse_storage_type(raw: &str) -> Result<StorageType, String> {
    raw.parse().map_err(|e: crate::error::ReplayError| e.to_string())
}
