pub mod keys;
pub mod room;
pub mod scripts;

pub use room::{RoomStore, WaitingSession};
pub use scripts::ScriptRunner;
