//! Interface de terminal do orquestrador: barra de conclusão e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`SummaryView`] mostra o estado de uma geração
//! de jobs no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::manifest::SliceDefinition;
use crate::state_machine::{JobStatus, TaggedJob};
use crate::summary::RunSummary;

/// Renderizador de resumos e jobs para a CLI.
///
/// Jobs concluídos aparecem em verde, em execução em amarelo e
/// aguardando worker em ciano.
pub struct SummaryView {
    // Estilo verde para jobs concluídos.
    green: Style,
    // Estilo amarelo para jobs em execução.
    yellow: Style,
    // Estilo ciano para jobs aguardando worker.
    cyan: Style,
    // Estilo para cabeçalhos.
    bold: Style,
}

impl Default for SummaryView {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryView {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
            bold: Style::new().bold(),
        }
    }

    fn status_style(&self, status: JobStatus) -> &Style {
        match status {
            JobStatus::Complete => &self.green,
            JobStatus::Running => &self.yellow,
            JobStatus::Waiting4Worker => &self.cyan,
        }
    }

    /// Linhas de texto com as contagens por status.
    pub fn summary_lines(&self, summary: &RunSummary) -> Vec<String> {
        let mut lines = vec![format!(
            "{} {}",
            self.bold.apply_to("Generation"),
            summary.generation
        )];
        for status in [JobStatus::Waiting4Worker, JobStatus::Running, JobStatus::Complete] {
            lines.push(format!(
                "  {:<18} {}",
                self.status_style(status).apply_to(status),
                summary.count(status)
            ));
        }
        if let (Some(min), Some(max)) = (summary.min_block_processed, summary.max_block_processed) {
            lines.push(format!("  blocks processed   {min}..={max}"));
        }
        lines
    }

    /// Imprime o resumo seguido de uma barra de conclusão estática.
    pub fn print_summary(&self, summary: &RunSummary) {
        for line in self.summary_lines(summary) {
            println!("{line}");
        }

        let pb = ProgressBar::with_draw_target(Some(summary.total as u64), ProgressDrawTarget::stdout());
        if let Ok(style) = ProgressStyle::with_template("  [{bar:40.green/blue}] {pos}/{len} complete ({msg})") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_position(summary.complete as u64);
        pb.abandon_with_message(format!("{:.1}%", summary.completion_ratio() * 100.0));

        let state = if summary.is_complete {
            self.green.apply_to("complete")
        } else if summary.is_running {
            self.yellow.apply_to("running")
        } else {
            self.cyan.apply_to("idle")
        };
        println!("  run is {state}");
    }

    /// Imprime as fatias de um manifesto, uma por linha.
    pub fn print_slices(&self, slices: &[SliceDefinition]) {
        println!(
            "{}",
            self.bold.apply_to(format!(
                "{:>5}  {:>12}  {:>12}  {:>10}  {:<14} {}",
                "slice", "start", "end", "blocks", "version", "snapshot"
            ))
        );
        for slice in slices {
            let hash = if slice.expected_integrity_hash.is_empty() {
                self.cyan.apply_to("unverified".to_string())
            } else {
                self.green.apply_to(slice.expected_integrity_hash.clone())
            };
            println!(
                "{:>5}  {:>12}  {:>12}  {:>10}  {:<14} {} ({hash})",
                slice.slice_id,
                slice.start_block,
                slice.end_block,
                slice.block_span(),
                slice.target_version,
                slice.snapshot_path
            );
        }
    }

    /// Imprime um job reivindicado em JSON junto com sua tag.
    pub fn print_tagged(&self, tagged: &TaggedJob) {
        println!(
            "{}",
            serde_json::to_string_pretty(&tagged.job).unwrap_or_default()
        );
        println!("{} {}", self.bold.apply_to("tag"), tagged.tag);
    }
}
