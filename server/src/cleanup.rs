//! Background pruning of generated art. Images are one-shot artifacts the
//! browser fetches right after generation; anything old is disk weight.

use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::WrapErr as _;
use tracing::{error, info};

use crate::state::AppState;

/// How often the prune cycle runs
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Generated images older than this are removed
const MAX_IMAGE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Run the cleanup loop forever; spawned beside the server from `main`
pub async fn run_cleanup(state: AppState) -> color_eyre::Result<()> {
    let mut timer = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        timer.tick().await;

        match prune_generated(&state.stability.generated_dir, MAX_IMAGE_AGE).await {
            Ok(0) => {}
            Ok(count) => info!(count, "Pruned old generated images"),
            Err(err) => error!("Cleanup cycle failed: {err:?}"),
        }
    }
}

/// Remove files in `dir` whose modification time is at least `max_age` ago.
/// Returns how many were removed; a missing directory is just zero work.
pub async fn prune_generated(dir: &Path, max_age: Duration) -> color_eyre::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .wrap_err_with(|| format!("Failed to read {}", dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .wrap_err("Filesystem does not report modification times")?;
        let age = modified.elapsed().unwrap_or_default();

        if age >= max_age {
            tokio::fs::remove_file(entry.path())
                .await
                .wrap_err_with(|| format!("Failed to remove {}", entry.path().display()))?;
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_prunes_nothing() {
        let dir = std::path::PathBuf::from("/definitely/not/here");
        assert_eq!(prune_generated(&dir, MAX_IMAGE_AGE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fresh_files_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("fresh.png"), b"png")
            .await
            .unwrap();

        let removed = prune_generated(dir.path(), MAX_IMAGE_AGE).await.unwrap();

        assert_eq!(removed, 0);
        assert!(dir.path().join("fresh.png").exists());
    }

    #[tokio::test]
    async fn zero_max_age_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.png"), b"png").await.unwrap();
        tokio::fs::write(dir.path().join("b.png"), b"png").await.unwrap();

        let removed = prune_generated(dir.path(), Duration::ZERO).await.unwrap();

        assert_eq!(removed, 2);
        assert!(!dir.path().join("a.png").exists());
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("keep")).await.unwrap();

        let removed = prune_generated(dir.path(), Duration::ZERO).await.unwrap();

        assert_eq!(removed, 0);
        assert!(dir.path().join("keep").exists());
    }
}
