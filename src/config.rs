//! Configuração do orquestrador carregada a partir de `replay-orchestrator.toml`.
//!
//! A struct [`OrchestratorConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `REPLAY_MANIFEST` e `REPLAY_PORT` têm precedência
//! sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Nome do arquivo procurado no diretório atual quando `--config` não é informado.
pub const DEFAULT_CONFIG_FILE: &str = "replay-orchestrator.toml";

/// Configuração de nível superior carregada de `replay-orchestrator.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Manifesto JSON com as fatias de blocos a reproduzir.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Endereço de escuta do serviço HTTP.
    #[serde(default = "default_host")]
    pub host: String,

    /// Porta do serviço HTTP.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Filtro de log padrão quando `REPLAY_LOG`/`RUST_LOG` não estão definidos.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Valor padrão para o host: todas as interfaces.
fn default_host() -> String {
    "0.0.0.0".to_string()
}

// Valor padrão para a porta: 4000, a porta liberada no firewall para os workers.
fn default_port() -> u16 {
    4000
}

// Valor padrão para o nível de log: "info".
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl OrchestratorConfig {
    /// Carrega a configuração de `path`, ou de `replay-orchestrator.toml` no
    /// diretório atual. Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str::<OrchestratorConfig>(contents)?)
    }

    /// Aplica as variáveis de ambiente lidas por `lookup`; valores vazios são ignorados.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(manifest) = lookup("REPLAY_MANIFEST")
            && !manifest.is_empty()
        {
            self.manifest_path = Some(PathBuf::from(manifest));
        }
        if let Some(port) = lookup("REPLAY_PORT")
            && !port.is_empty()
        {
            self.port = port
                .parse()
                .with_context(|| format!("REPLAY_PORT must be a port number, got {port:?}"))?;
        }
        Ok(self)
    }

    /// Endereço de escuta combinando host e porta.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
