//! List extension module candidates without loading them

use anyhow::{Context, Result};
use graphene_core::HostConfig;
use graphene_core::extensions::{DirectorySource, ModuleSource};

pub fn run(config: &HostConfig) -> Result<()> {
    let source = DirectorySource::new(&config.extensions_dir);
    let listing = list(&source).with_context(|| {
        format!(
            "Failed to scan extensions directory {}",
            config.extensions_dir.display()
        )
    })?;

    if listing.is_empty() {
        println!(
            "No extension modules found in {}",
            config.extensions_dir.display()
        );
        return Ok(());
    }

    for line in listing {
        println!("{line}");
    }
    Ok(())
}

/// One line per candidate: identity (or `?` when unreadable) and path
fn list(source: &dyn ModuleSource) -> std::io::Result<Vec<String>> {
    let lines = source
        .candidates()?
        .into_iter()
        .map(|path| {
            let identity = source
                .identity_of(&path)
                .map_or_else(|| "?".to_string(), |id| id.to_string());
            format!("{:<24} {}", identity, path.display())
        })
        .collect();
    Ok(lines)
}
