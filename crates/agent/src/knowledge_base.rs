//! Knowledge base — the swappable essence + corpus index state cell and the
//! reload pipeline that refreshes it.
//!
//! Readers take a [`KnowledgeSnapshot`] (two `Arc`s) and keep using it for the
//! whole request. A rebuild assembles a complete new snapshot off the async
//! runtime and swaps it in by reference; a failed rebuild leaves the current
//! snapshot and the artifacts exactly as they were.
//!
//! Reload order:
//!
//! 1. run the conversion command, if one is configured (bounded by a timeout)
//! 2. rebuild the corpus index from a fresh scan
//! 3. distill the same scan into the essence artifact
//! 4. re-read the essence from the artifact
//! 5. swap

use atlas_config::AppConfig;
use atlas_core::error::{KnowledgeError, ReloadError};
use atlas_knowledge::{
    ChunkingSettings, CorpusIndex, CorpusScan, DistillOutcome, DistillSettings, Distiller,
    KeywordPattern, RebuildReport, Scorer, read_essence,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Everything the knowledge base needs to (re)build itself.
#[derive(Debug, Clone)]
pub struct KnowledgeSettings {
    pub documents_dir: PathBuf,
    pub essence_path: PathBuf,
    pub chunking: ChunkingSettings,
    pub ranking: KeywordPattern,
    pub keyword_bonus: f64,
    pub distill: DistillSettings,
    /// Distill when the knowledge base is first opened.
    pub distill_on_open: bool,
    pub convert_command: Option<String>,
    pub convert_timeout: Duration,
    /// Working directory for the conversion command.
    pub working_dir: PathBuf,
}

impl KnowledgeSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, KnowledgeError> {
        let k = &config.knowledge;
        Ok(Self {
            documents_dir: config.documents_dir(),
            essence_path: config.essence_path(),
            chunking: ChunkingSettings {
                size: k.chunk_size,
                overlap: k.chunk_overlap,
            },
            ranking: KeywordPattern::new(&k.ranking_keywords)?,
            keyword_bonus: k.keyword_bonus,
            distill: DistillSettings {
                budget: k.essence_budget,
                head_lines: k.head_lines,
                key_lines: k.key_lines,
                tail_lines: k.tail_lines,
                keywords: KeywordPattern::new(&k.distill_keywords)?,
            },
            distill_on_open: k.distill_on_startup,
            convert_command: k
                .convert_command
                .clone()
                .filter(|c| !c.trim().is_empty()),
            convert_timeout: Duration::from_secs(k.convert_timeout_secs),
            working_dir: PathBuf::from(&config.workspace_dir),
        })
    }

    fn scorer(&self) -> Scorer {
        Scorer::new(self.ranking.clone(), self.keyword_bonus)
    }
}

/// A consistent view of the essence and the index.
#[derive(Debug, Clone)]
pub struct KnowledgeSnapshot {
    pub essence: Arc<str>,
    pub index: Arc<CorpusIndex>,
}

/// What the distillation step of a rebuild did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DistillSummary {
    Written {
        chars: usize,
        documents_included: usize,
        documents_total: usize,
    },
    SourceMissing,
    Skipped,
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub finished_at: DateTime<Utc>,
    /// Whether the conversion command ran.
    pub converted: bool,
    pub distill: DistillSummary,
    /// Length of the essence now in use, in characters.
    pub essence_chars: usize,
    pub index: RebuildReport,
}

/// The last reload attempt, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct LastReload {
    pub ok: bool,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReloadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immediate answer to a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReloadAck {
    pub ok: bool,
    /// `false` when a reload was already running.
    pub started: bool,
}

pub struct KnowledgeBase {
    settings: KnowledgeSettings,
    state: RwLock<KnowledgeSnapshot>,
    reloading: AtomicBool,
    last_reload: RwLock<Option<LastReload>>,
}

impl KnowledgeBase {
    /// A knowledge base with no essence and no chunks.
    pub fn empty(settings: KnowledgeSettings) -> Self {
        let index = CorpusIndex::empty(settings.scorer());
        Self {
            settings,
            state: RwLock::new(KnowledgeSnapshot {
                essence: Arc::from(""),
                index: Arc::new(index),
            }),
            reloading: AtomicBool::new(false),
            last_reload: RwLock::new(None),
        }
    }

    /// Build the initial state from disk.
    ///
    /// The conversion command is not run here; only reloads run it.
    pub async fn open(settings: KnowledgeSettings) -> Result<Self, ReloadError> {
        let distill = settings.distill_on_open;
        let kb = Self::empty(settings);
        let report = kb.rebuild(distill, false).await?;
        info!(
            essence_chars = report.essence_chars,
            chunks = report.index.chunks,
            documents = report.index.documents,
            "Knowledge base ready"
        );
        Ok(kb)
    }

    /// The current essence and index.
    pub async fn snapshot(&self) -> KnowledgeSnapshot {
        self.state.read().await.clone()
    }

    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    pub fn documents_dir(&self) -> &Path {
        &self.settings.documents_dir
    }

    pub fn converter_configured(&self) -> bool {
        self.settings.convert_command.is_some()
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading.load(Ordering::Acquire)
    }

    pub async fn last_reload(&self) -> Option<LastReload> {
        self.last_reload.read().await.clone()
    }

    /// Start a reload in the background unless one is already running.
    pub fn trigger_reload(self: &Arc<Self>) -> ReloadAck {
        if self
            .reloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Reload already running, request acknowledged without starting another");
            return ReloadAck {
                ok: true,
                started: false,
            };
        }

        let kb = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = ReloadGuard(&kb.reloading);
            let result = kb.reload().await;
            let last = match result {
                Ok(report) => LastReload {
                    ok: true,
                    finished_at: report.finished_at,
                    report: Some(report),
                    error: None,
                },
                Err(e) => {
                    error!(error = %e, "Reload failed, keeping previous knowledge base");
                    LastReload {
                        ok: false,
                        finished_at: Utc::now(),
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            *kb.last_reload.write().await = Some(last);
        });

        ReloadAck {
            ok: true,
            started: true,
        }
    }

    /// Convert (if configured), distill and rebuild, then swap.
    pub async fn reload(&self) -> Result<ReloadReport, ReloadError> {
        let converted = match &self.settings.convert_command {
            Some(command) => {
                run_converter(command, &self.settings.working_dir, self.settings.convert_timeout)
                    .await?;
                true
            }
            None => false,
        };
        self.rebuild(true, converted).await
    }

    /// Rebuild from disk and swap the new snapshot in.
    async fn rebuild(&self, distill: bool, converted: bool) -> Result<ReloadReport, ReloadError> {
        let settings = self.settings.clone();
        let (snapshot, report) =
            tokio::task::spawn_blocking(move || build_snapshot(&settings, distill, converted))
                .await
                .map_err(|e| ReloadError::Task(e.to_string()))??;

        *self.state.write().await = snapshot;
        Ok(report)
    }
}

/// Clears the reload flag however the reload task ends.
struct ReloadGuard<'a>(&'a AtomicBool);

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn build_snapshot(
    settings: &KnowledgeSettings,
    distill: bool,
    converted: bool,
) -> Result<(KnowledgeSnapshot, ReloadReport), KnowledgeError> {
    let scan = CorpusScan::read_dir(&settings.documents_dir);
    // index first: a failed build must not leave a new artifact behind
    let (index, index_report) = CorpusIndex::from_scan(&scan, settings.chunking, settings.scorer())?;

    let distill_summary = if distill {
        match Distiller::new(settings.distill.clone())
            .distill_to_artifact(&scan, &settings.essence_path)?
        {
            DistillOutcome::Written(e) => DistillSummary::Written {
                chars: e.chars,
                documents_included: e.documents_included,
                documents_total: e.documents_total,
            },
            DistillOutcome::SourceMissing => DistillSummary::SourceMissing,
        }
    } else {
        DistillSummary::Skipped
    };

    // the artifact is the source of truth for the essence
    let essence = read_essence(&settings.essence_path);

    let report = ReloadReport {
        finished_at: Utc::now(),
        converted,
        distill: distill_summary,
        essence_chars: essence.chars().count(),
        index: index_report,
    };
    let snapshot = KnowledgeSnapshot {
        essence: Arc::from(essence),
        index: Arc::new(index),
    };
    Ok((snapshot, report))
}

/// Run the document conversion command through the platform shell.
async fn run_converter(command: &str, cwd: &Path, limit: Duration) -> Result<(), ReloadError> {
    #[cfg(windows)]
    let mut cmd = {
        let mut c = tokio::process::Command::new("cmd");
        c.arg("/C").arg(command);
        c
    };
    #[cfg(not(windows))]
    let mut cmd = {
        let mut c = tokio::process::Command::new("sh");
        // own process group, so a timeout can take down everything it started
        c.arg("-c").arg(command).process_group(0);
        c
    };

    info!(command, "Running document conversion");
    let mut child = cmd
        .current_dir(cwd)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ReloadError::Spawn(e.to_string()))?;

    match tokio::time::timeout(limit, child.wait()).await {
        Ok(Ok(status)) if status.success() => {
            info!("Document conversion finished");
            Ok(())
        }
        Ok(Ok(status)) => Err(ReloadError::ConversionFailed {
            code: status.code(),
        }),
        Ok(Err(e)) => Err(ReloadError::Spawn(e.to_string())),
        Err(_) => {
            warn!(secs = limit.as_secs(), "Document conversion timed out, killing it");
            #[cfg(unix)]
            if let Some(pid) = child.id().and_then(|p| i32::try_from(p).ok()) {
                // SAFETY: signals only the process group created for this child
                unsafe {
                    libc::kill(-pid, libc::SIGKILL);
                }
            }
            let _ = child.kill().await;
            Err(ReloadError::ConversionTimeout(limit.as_secs()))
        }
    }
}
