use std::path::Path;

use crate::{CleanArgs, build::STAGING_PREFIX, config::Config};

pub async fn run(args: &CleanArgs) -> Result<(), anyhow::Error> {
    let config_path = Config::resolve_path(args.config_file.as_deref())?;
    let config = Config::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = Config::base_path(&config_path);

    // Delete the generated site folder
    let site_path = base_path.join(&config.site.output);
    if site_path.exists() {
        remove(&site_path, args.dry_run).await?;
    } else {
        println!("Nothing to clean at {}", site_path.display());
    }

    // Delete staging folders left behind by interrupted builds
    let staging_root = site_path.parent().unwrap_or(base_path.as_path());
    let mut entries = tokio::fs::read_dir(staging_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            remove(&entry.path(), args.dry_run).await?;
        }
    }

    Ok(())
}

async fn remove(path: &Path, dry_run: bool) -> Result<(), anyhow::Error> {
    if dry_run {
        println!("Would delete {}", path.display());
    } else {
        tokio::fs::remove_dir_all(path).await?;
        println!("Deleted {}", path.display());
    }
    Ok(())
}
