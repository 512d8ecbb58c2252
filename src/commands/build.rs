use crate::{
    BuildArgs,
    build::{BuildOptions, BuildResult, Builder},
    config::Config,
};

pub async fn run(args: &BuildArgs) -> Result<(), anyhow::Error> {
    let config_path = Config::resolve_path(args.config_file.as_deref())?;
    let config = Config::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = Config::base_path(&config_path);

    let builder = Builder::new(config, base_path);
    let options = BuildOptions {
        clean: args.clean,
        drafts: args.drafts,
        ..Default::default()
    };
    let result = tokio::task::spawn_blocking(move || builder.build(&options)).await??;

    print_summary("Built", &result);
    if !result.is_success() {
        anyhow::bail!("{} post(s) failed to build", result.failures.len());
    }

    Ok(())
}

/// Print what a build wrote, then every post that failed.
pub fn print_summary(verb: &str, result: &BuildResult) {
    println!(
        "{verb} site to {} ({} posts, {} listing pages, {} static files)",
        result.output_dir.display(),
        result.posts,
        result.listings,
        result.static_files
    );
    if result.drafts_skipped > 0 {
        println!(
            "Skipped {} draft(s); pass --drafts to include them",
            result.drafts_skipped
        );
    }
    for failure in &result.failures {
        eprintln!("  failed: {failure}");
    }
}
