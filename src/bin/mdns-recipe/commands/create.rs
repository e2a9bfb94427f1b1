//! `mdns-recipe create` command

use anyhow::Result;

use crate::cli::{recipe_options, CreateArgs};
use mdns_recipe::ops::create;
use mdns_recipe::util::GlobalContext;

pub fn execute(args: CreateArgs, quiet: bool) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_quiet(quiet);

    let mut opts = recipe_options(&args.pkg_version, &args.settings)?;
    opts.registry = args.paths.registry;
    opts.build_dir = args.paths.build_dir;
    opts.package_dir = args.paths.package_dir;

    let result = create(&ctx, &opts)?;

    eprintln!(
        "    Finished {} {} ({}) -> {}",
        result.info.name,
        result.info.version,
        opts.target,
        opts.package_root(&ctx).display()
    );
    eprintln!("    Metadata {}", result.info_path.display());

    Ok(())
}
