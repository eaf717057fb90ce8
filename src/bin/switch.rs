//! OK switches the stage lights on, F1 switches them off. The LED by OK shows
//! which state we are in.

use amp2_control::{board, logging, Amp2Config};

fn main() -> anyhow::Result<()> {
    logging::init();
    board::serve(Amp2Config::switch())
}
