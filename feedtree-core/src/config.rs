use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
}

impl TreeConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<TreeConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using TreeConfig::default().",
                path.display()
            );
            TreeConfig::default()
        };
        cfg.resolve_paths(root);
        cfg.fetch.sanitize();
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        if let Some(p) = self.logbook.anomaly_log.take() {
            self.logbook.anomaly_log = Some(absolutize(root, &p));
        }
    }
}

// -------------------------------------------------------------------------
// Paging policy (used by services::session)
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "FetchConfig::default_min_chunk")]
    pub min_chunk: usize,
    #[serde(default = "FetchConfig::default_max_chunk")]
    pub max_chunk: usize,
    /// Emit a snapshot every N pages (the final page always emits).
    #[serde(default = "FetchConfig::default_emit_every_pages")]
    pub emit_every_pages: usize,
}

impl FetchConfig {
    fn default_min_chunk() -> usize {
        20
    }

    fn default_max_chunk() -> usize {
        100
    }

    fn default_emit_every_pages() -> usize {
        3
    }

    fn sanitize(&mut self) {
        if self.max_chunk == 0 {
            self.max_chunk = Self::default_max_chunk();
        }
        if self.min_chunk > self.max_chunk {
            tracing::warn!(
                min_chunk = self.min_chunk,
                max_chunk = self.max_chunk,
                "min_chunk above max_chunk; clamping"
            );
            self.min_chunk = self.max_chunk;
        }
        if self.emit_every_pages == 0 {
            self.emit_every_pages = 1;
        }
    }

    /// Items per page for a feed with `total` instances.
    ///
    /// Small feeds come in one page, large ones are capped at `max_chunk`.
    /// Hand-built configs that skipped `sanitize` are held to the same bounds:
    /// a zero `max_chunk` means the default and `min_chunk` never exceeds it.
    pub fn chunk_size(&self, total: usize) -> usize {
        let max_chunk = match self.max_chunk {
            0 => Self::default_max_chunk(),
            n => n,
        };
        let min_chunk = self.min_chunk.min(max_chunk);
        if total < min_chunk {
            total
        } else if total > max_chunk {
            max_chunk
        } else {
            total.max(min_chunk)
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_chunk: Self::default_min_chunk(),
            max_chunk: Self::default_max_chunk(),
            emit_every_pages: Self::default_emit_every_pages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "LayoutConfig::default_single_row_height")]
    pub single_row_height: u32,
    #[serde(default = "LayoutConfig::default_base_height")]
    pub base_height: u32,
    #[serde(default = "LayoutConfig::default_row_height")]
    pub row_height: u32,
}

impl LayoutConfig {
    fn default_single_row_height() -> u32 {
        80
    }

    fn default_base_height() -> u32 {
        60
    }

    fn default_row_height() -> u32 {
        70
    }

    pub fn canvas_height(&self, total_rows: usize) -> u32 {
        if total_rows <= 1 {
            self.single_row_height
        } else {
            let extra = u32::try_from(total_rows - 1).unwrap_or(u32::MAX);
            self.base_height
                .saturating_add(extra.saturating_mul(self.row_height))
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            single_row_height: Self::default_single_row_height(),
            base_height: Self::default_base_height(),
            row_height: Self::default_row_height(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogbookConfig {
    /// JSONL file receiving integration anomalies. Off when unset.
    #[serde(default)]
    pub anomaly_log: Option<PathBuf>,
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
