//! Reports inconsistencies between the bitmaps and the directory tree.
use std::process;

use dirfs::config::Environment;
use dirfs::io::{BlockStorage, FileBlockEmulator};
use dirfs::{layout, DirFS};

fn main() -> anyhow::Result<()> {
    let env = Environment::from_env();
    let dev = FileBlockEmulator::open_disk(&env.disk_name, layout::N_BLOCKS)?;
    let report = DirFS::open(dev)?.check()?;
    for issue in &report {
        println!("{}", issue);
    }
    if !report.is_empty() {
        process::exit(1);
    }
    Ok(())
}
