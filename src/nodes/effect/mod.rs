mod add;
mod bad_value;
mod delay;
mod gain;
mod pass_through;
mod up_mixer;

pub use add::*;
pub use bad_value::*;
pub use delay::*;
pub use gain::*;
pub use pass_through::*;
pub use up_mixer::*;
