//! Lists a directory, `ZPWD` itself when no path is given.
use std::process;

use dirfs::config::Environment;
use dirfs::io::{BlockStorage, FileBlockEmulator};
use dirfs::{layout, DirFS};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let path = match args.len() {
        1 => "",
        2 => args[1].as_str(),
        _ => {
            eprintln!("Usage: zfilez [path]");
            process::exit(1);
        }
    };

    let env = Environment::from_env();
    let dev = FileBlockEmulator::open_disk(&env.disk_name, layout::N_BLOCKS)?;
    let mut fs = DirFS::open(dev)?;
    match fs.list(&env.cwd, path) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(err) => {
            eprintln!("zfilez: {}", err);
            process::exit(1);
        }
    }
    Ok(())
}
