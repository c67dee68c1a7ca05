mod event;
mod record;
mod snapshot;
mod target;
mod trigger;
mod zone;

pub use event::*;
pub use record::*;
pub use snapshot::*;
pub use target::*;
pub use trigger::*;
pub use zone::*;
