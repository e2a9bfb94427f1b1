//! `mdns-recipe info` command

use anyhow::Result;

use crate::cli::{recipe_options, InfoArgs};
use mdns_recipe::ops::describe;
use mdns_recipe::util::GlobalContext;

pub fn execute(args: InfoArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let mut opts = recipe_options(&args.pkg_version, &args.settings)?;
    opts.build_dir = args.build_dir;
    opts.package_dir = args.package_dir;

    let info = describe(&ctx, &opts)?;

    println!("{}", info.to_json()?);
    Ok(())
}
