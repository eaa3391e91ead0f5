pub mod generate;
pub mod ping;

pub use generate::handle_generate;
pub use ping::{handle_ping, handle_root};
