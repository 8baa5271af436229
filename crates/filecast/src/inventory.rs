//! Group-wide file inventory, printed by the coordinator before the transfer.

use std::fmt;
use std::path::Path;

use filecast_comm::{Communicator, CommunicatorExt};
use filecast_core::Rank;
use filecast_store::FileStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FatalResult;

/// Hostname reported when the system call fails.
const UNKNOWN_HOST: &str = "unknown";

/// This machine's hostname.
pub fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|_| UNKNOWN_HOST.to_string())
}

/// What one member knows about its local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub hostname: String,
    pub path: String,
    /// `None` when the file does not exist.
    pub size: Option<u64>,
}

/// Every member's [`FileInfo`], indexed by rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub root: Rank,
    pub entries: Vec<FileInfo>,
}

impl Inventory {
    fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, info)| {
                let marker = if Rank::new(index) == self.root { "*" } else { "" };
                let size = info
                    .size
                    .map_or_else(|| "N/A".to_string(), |size| size.to_string());
                format!(
                    " {marker:>1} {index:>4} [{}] {size:>12} {}",
                    info.hostname, info.path
                )
            })
            .collect()
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self.lines();
        let width = lines.iter().map(String::len).max().unwrap_or(0);
        let rule = "-".repeat(width);

        writeln!(f, "{rule}")?;
        for line in &lines {
            writeln!(f, "{line}")?;
        }
        write!(f, "{rule}")
    }
}

/// Gather every member's file info to the coordinator and log it there.
///
/// Returns the inventory on the coordinator and `None` elsewhere.
pub(crate) async fn report_inventory<C, S>(
    comm: &C,
    store: &S,
    path: &Path,
    root: Rank,
    hostname: &str,
) -> FatalResult<Option<Inventory>>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    let local = FileInfo {
        hostname: hostname.to_string(),
        path: path.display().to_string(),
        size: store.size(path).await?,
    };

    let gathered = comm.gather_value(&local, Rank::COORDINATOR).await?;
    Ok(gathered.map(|entries| {
        let inventory = Inventory { root, entries };
        info!(rank = %comm.rank(), "file inventory\n{inventory}");
        inventory
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(host: &str, size: Option<u64>) -> FileInfo {
        FileInfo {
            hostname: host.to_string(),
            path: "/data/file".to_string(),
            size,
        }
    }

    #[test]
    fn test_table_marks_root_and_absent_files() {
        let inventory = Inventory {
            root: Rank(1),
            entries: vec![info("node-a", None), info("node-b", Some(4096))],
        };
        let table = inventory.to_string();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].chars().all(|c| c == '-'));
        assert_eq!(lines[0], lines[3]);
        assert!(lines[1].contains("N/A"));
        assert!(!lines[1].contains('*'));
        assert!(lines[2].starts_with(" *"));
        assert!(lines[2].contains("[node-b]"));
        assert!(lines[2].contains("4096"));
    }

    #[test]
    fn test_local_hostname_is_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
