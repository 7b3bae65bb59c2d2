//! Renders `ftp-mirror.1` into `OUT_DIR`.
//!
//! Only the command-line surface appears in the page: the local and remote
//! root overrides and the `-v` verbosity count. Connection settings are read
//! from `ftp-mirror.toml` or `FTP_MIRROR_*` variables at run time and have no
//! clap definition to render.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const MAN_PAGE: &str = "ftp-mirror.1";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let mut buffer = Vec::new();
    Man::new(Cli::command()).render(&mut buffer)?;

    let mut file = File::create(out_dir.join(MAN_PAGE))?;
    file.write_all(&buffer)?;

    Ok(())
}
