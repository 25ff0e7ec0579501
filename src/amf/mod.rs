// AMF (Action Message Format) encoding and decoding

mod amf0;
mod decode;

pub use amf0::*;
pub use decode::*;
