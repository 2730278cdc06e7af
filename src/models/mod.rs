mod engagement;
mod media;

pub use engagement::*;
pub use media::*;
