//! Real-time fan-out core
//!
//! One session task per live connection; rooms hold lightweight
//! connection handles; the registry guarantees one `Room` per id.

mod connection;
mod protocol;
mod registry;
mod room;
mod session;

pub use connection::ConnectionHandle;
pub use registry::{RoomRegistry, RoomSubscription};
pub use room::Room;
pub use session::{MessageStore, run_room_session};
