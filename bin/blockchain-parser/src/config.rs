use std::path::PathBuf;

use bitcoin_blockfile::Network;
use eyre::{eyre, Result};

/// Where a node keeps its data when started without `-datadir`.
pub fn default_datadir() -> Option<PathBuf> {
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        dirs::data_dir().map(|dir| dir.join("Bitcoin"))
    } else {
        dirs::home_dir().map(|dir| dir.join(".bitcoin"))
    }
}

/// Base data dir (explicit or default) plus the network's sub-directory.
pub fn resolve_datadir(explicit: Option<PathBuf>, network: Network) -> Result<PathBuf> {
    let base = explicit
        .or_else(default_datadir)
        .ok_or_else(|| eyre!("Could not determine the node data directory, pass --datadir"))?;

    Ok(match network.data_subdir() {
        Some(subdir) => base.join(subdir),
        None => base,
    })
}
