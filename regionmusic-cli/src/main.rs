//! # rmusic
//!
//! Command shell for the region music playback and cache manager.

use log::error;

mod cli;
mod logging;
mod runner;

fn main() {
    let log_ring = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_ring) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}
