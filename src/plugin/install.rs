use super::{Plugin, COMMIT, SOURCE_DIR};
use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Download the pinned SPOC archive into the plugin home and unpack it as
/// `spoc-source`. Steps already done on disk are skipped.
pub async fn install(plugin: &Plugin, progress: impl Fn(String)) -> Result<PathBuf> {
    let home = plugin.home();
    let target = plugin.source_dir();
    if target.is_dir() {
        progress(format!("SPOC already installed at {}", target.display()));
        return Ok(target);
    }
    tokio::fs::create_dir_all(home)
        .await
        .with_context(|| format!("create {}", home.display()))?;

    let archive = home.join(format!("{COMMIT}.tar.gz"));
    if !archive.is_file() {
        let url = Plugin::archive_url();
        progress(format!("Downloading {url}"));
        download(&url, &archive).await?;
    }

    progress(format!("Extracting {}", archive.display()));
    let status = tokio::process::Command::new("tar")
        .arg("-xf")
        .arg(&archive)
        .current_dir(home)
        .status()
        .await
        .context("run tar")?;
    if !status.success() {
        bail!("tar failed on {} ({status})", archive.display());
    }

    let extracted = find_extracted(home)?;
    tokio::fs::rename(&extracted, &target)
        .await
        .with_context(|| format!("rename {} to {SOURCE_DIR}", extracted.display()))?;
    progress(format!("Installed SPOC into {}", target.display()));
    Ok(target)
}

async fn download(url: &str, dest: &Path) -> Result<()> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;

    // The archive only appears under its final name once fully written.
    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .with_context(|| format!("create {}", partial.display()))?;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("read download body")?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, dest)
        .await
        .with_context(|| format!("move download to {}", dest.display()))?;
    Ok(())
}

/// GitHub archives unpack to `SPOC-<full commit hash>/`.
fn find_extracted(home: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(home).with_context(|| format!("list {}", home.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if entry.path().is_dir() && name.to_string_lossy().starts_with("SPOC") {
            return Ok(entry.path());
        }
    }
    bail!("no SPOC* directory found in {} after extraction", home.display())
}
