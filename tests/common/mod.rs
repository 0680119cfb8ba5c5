#[allow(dead_code)]
pub mod stub;

use ctor::ctor;

#[ctor]
fn init() {
    color_eyre::install().unwrap();
    tracing_subscriber::fmt::init();
}
