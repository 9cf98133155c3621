//! Binary for the `voxconvert` tool.

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

use clap::Parser as _;

use voxfmt_convert::{ConvertArgs, logging, run};

fn main() -> Result<(), anyhow::Error> {
    let args = ConvertArgs::parse();
    logging::install(&args.logging)?;
    run(&args, &mut std::io::stdout().lock())
}
