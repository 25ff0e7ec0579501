// RTMP protocol utilities

mod chunk_writer;
mod command;
mod constants;
mod data;
mod handshake;
mod messages;
mod packet;

pub use chunk_writer::*;
pub use command::*;
pub use constants::*;
pub use data::*;
pub use handshake::*;
pub use messages::*;
pub use packet::*;
