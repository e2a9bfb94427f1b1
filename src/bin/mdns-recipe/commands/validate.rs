//! `mdns-recipe validate` command

use anyhow::Result;

use crate::cli::{recipe_options, ValidateArgs};
use mdns_recipe::ops::validate_only;
use mdns_recipe::util::GlobalContext;

pub fn execute(args: ValidateArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let mut opts = recipe_options(&args.pkg_version, &args.settings)?;
    opts.registry = args.registry;

    validate_only(&ctx, &opts)?;

    println!("{} is supported for {}", opts.version, opts.target);
    Ok(())
}
