use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AgentpadError, Result};
use crate::output::OutputLine;

/// One persisted snapshot of a completed run's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputTab {
    /// Unique tab identifier
    pub id: String,
    /// Display name ("Output 1", "Output 2", ...)
    pub name: String,
    /// Lines captured from the sink for this run
    pub lines: Vec<OutputLine>,
    /// Creation timestamp (Unix epoch seconds)
    pub created_at: u64,
}

impl OutputTab {
    pub fn new(name: String, lines: Vec<OutputLine>) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            id: generate_tab_id(),
            name,
            lines,
            created_at: now,
        }
    }
}

/// Tab persistence: one JSON file per tab under the data directory,
/// pruned to a maximum count by deleting the oldest.
pub struct TabStore {
    tabs_dir: PathBuf,
    max_tabs: usize,
}

impl TabStore {
    pub fn new(data_dir: PathBuf, max_tabs: usize) -> Self {
        Self {
            tabs_dir: data_dir.join("tabs"),
            max_tabs,
        }
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.tabs_dir).await?;
        Ok(())
    }

    fn tab_path(&self, id: &str) -> PathBuf {
        self.tabs_dir.join(format!("{}.json", id))
    }

    /// Snapshot a run into a new tab and prune beyond the configured max.
    /// Returns the saved tab.
    pub async fn push(&self, lines: Vec<OutputLine>) -> Result<OutputTab> {
        self.ensure_dir().await?;

        let existing = self.list().await?;
        let name = format!("Output {}", next_tab_number(&existing));
        let tab = OutputTab::new(name, lines);

        let json = serde_json::to_string_pretty(&tab)?;
        fs::write(self.tab_path(&tab.id), json).await?;
        debug!(id = %tab.id, name = %tab.name, "Saved output tab");

        self.prune().await?;
        Ok(tab)
    }

    /// Load a tab by id, or by name ("Output 3").
    pub async fn get(&self, id_or_name: &str) -> Result<OutputTab> {
        let path = self.tab_path(id_or_name);
        if path.exists() {
            let json = fs::read_to_string(&path).await?;
            return Ok(serde_json::from_str(&json)?);
        }

        let tabs = self.list().await?;
        tabs.into_iter()
            .find(|t| t.name == id_or_name)
            .ok_or_else(|| AgentpadError::TabNotFound {
                id: id_or_name.to_string(),
            })
    }

    /// All tabs, oldest first.
    pub async fn list(&self) -> Result<Vec<OutputTab>> {
        self.ensure_dir().await?;

        let mut tabs = Vec::new();
        let mut entries = fs::read_dir(&self.tabs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match fs::read_to_string(&path).await {
                    Ok(json) => {
                        if let Ok(tab) = serde_json::from_str::<OutputTab>(&json) {
                            tabs.push(tab);
                        }
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Failed to read tab file");
                    }
                }
            }
        }

        tabs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tabs)
    }

    /// Delete everything. Returns the number of tabs removed.
    pub async fn clear(&self) -> Result<usize> {
        let tabs = self.list().await?;
        let count = tabs.len();
        for tab in tabs {
            fs::remove_file(self.tab_path(&tab.id)).await?;
        }
        if count > 0 {
            info!(count, "Cleared output tabs");
        }
        Ok(count)
    }

    /// Evict oldest tabs until at most `max_tabs` remain.
    async fn prune(&self) -> Result<()> {
        let tabs = self.list().await?;
        if tabs.len() <= self.max_tabs {
            return Ok(());
        }

        let excess = tabs.len() - self.max_tabs;
        for tab in tabs.into_iter().take(excess) {
            fs::remove_file(self.tab_path(&tab.id)).await?;
            debug!(id = %tab.id, name = %tab.name, "Evicted oldest tab");
        }
        Ok(())
    }
}

/// Next "Output N" ordinal. Counts up from the largest existing ordinal so
/// names stay unique after evictions.
fn next_tab_number(existing: &[OutputTab]) -> usize {
    existing
        .iter()
        .filter_map(|t| t.name.strip_prefix("Output "))
        .filter_map(|n| n.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

/// Generate a short, unique tab ID (base36 timestamp + counter).
fn generate_tab_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    let combined = (timestamp & 0xFFFFFF) << 8 | (counter as u64 & 0xFF);
    format_base36(combined)
}

/// Format a number as base36 string
pub(crate) fn format_base36(mut n: u64) -> String {
    const CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut result = Vec::new();
    while n > 0 {
        result.push(CHARS[(n % 36) as usize]);
        n /= 36;
    }
    result.reverse();
    String::from_utf8(result).unwrap_or_else(|_| "0".to_string())
}
