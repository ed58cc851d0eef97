//! Formats the virtual disk named by `ZDISK`, creating the image if needed.
use std::fs::OpenOptions;

use anyhow::Context;
use dirfs::config::Environment;
use dirfs::io::FileBlockEmulatorBuilder;
use dirfs::{layout, DirFS};

fn main() -> anyhow::Result<()> {
    let env = Environment::from_env();
    let image = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&env.disk_name)
        .with_context(|| format!("unable to open {}", env.disk_name.display()))?;

    let dev = FileBlockEmulatorBuilder::from(image)
        .with_block_count(layout::N_BLOCKS)
        .build()?;
    DirFS::format(dev)?.into_inner()?;
    Ok(())
}
