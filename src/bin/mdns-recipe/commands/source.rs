//! `mdns-recipe source` command

use anyhow::Result;

use crate::cli::{recipe_options, SourceArgs};
use mdns_recipe::ops::prepare_sources;
use mdns_recipe::util::GlobalContext;

pub fn execute(args: SourceArgs, quiet: bool) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_quiet(quiet);

    let mut opts = recipe_options(&args.pkg_version, &args.settings)?;
    opts.registry = args.registry;
    opts.build_dir = args.build_dir;

    let layout = prepare_sources(&ctx, &opts)?;

    println!("{}", layout.root().display());
    Ok(())
}
