//! Hold the local LED on while the system is up; the local button shuts it
//! down.

use amp2_control::{board, logging, Amp2Config};

fn main() -> anyhow::Result<()> {
    logging::init();
    board::serve(Amp2Config::power())
}
