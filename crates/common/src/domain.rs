mod device;
mod event;
mod result;
mod scaled_amount;

pub use device::*;
pub use event::*;
pub use result::*;
pub use scaled_amount::*;
