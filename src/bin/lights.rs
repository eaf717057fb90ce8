//! Comms LEDs breathe while idle; OK and F1 each play a scene with a fast
//! pulse while it runs.

use amp2_control::{board, logging, Amp2Config};

fn main() -> anyhow::Result<()> {
    logging::init();
    board::serve(Amp2Config::lights())
}
