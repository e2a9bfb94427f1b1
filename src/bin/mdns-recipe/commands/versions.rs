//! `mdns-recipe versions` command

use anyhow::Result;

use crate::cli::VersionsArgs;
use mdns_recipe::ops::{load_registry, SupportMatrix};
use mdns_recipe::util::GlobalContext;

pub fn execute(args: VersionsArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let registry = load_registry(&ctx, &args.registry)?;
    let matrix = SupportMatrix::default();

    let versions = registry.versions();
    if versions.is_empty() {
        eprintln!("No versions in {}", args.registry.display());
        return Ok(());
    }

    for version in versions {
        let rules = matrix.rules_for(&version, registry.support_for(&version));
        let os: Vec<&str> = rules.os.iter().map(|os| os.as_str()).collect();
        let patches = registry.patches_for(&version).len();

        let mut line = format!("{:<16} {}", version.to_string(), os.join(", "));
        if patches > 0 {
            line.push_str(&format!(" ({} patches)", patches));
        }
        println!("{}", line);
    }

    Ok(())
}
