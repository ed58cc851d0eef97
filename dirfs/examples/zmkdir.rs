//! Creates one directory relative to `ZPWD`.
use std::process;

use dirfs::config::Environment;
use dirfs::io::{BlockStorage, FileBlockEmulator};
use dirfs::{layout, DirFS};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: zmkdir <dirname>");
        process::exit(1);
    }

    let env = Environment::from_env();
    let dev = FileBlockEmulator::open_disk(&env.disk_name, layout::N_BLOCKS)?;
    let mut fs = DirFS::open(dev)?;
    if let Err(err) = fs.mkdir(&env.cwd, &args[1]) {
        eprintln!("zmkdir: {}", err);
        process::exit(1);
    }
    fs.into_inner()?;
    Ok(())
}
