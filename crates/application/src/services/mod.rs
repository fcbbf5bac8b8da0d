pub mod message_service;
pub mod read_service;
pub mod room_service;

pub use message_service::{MessageService, MessageServiceDependencies};
pub use read_service::{ReadService, ReadServiceDependencies};
pub use room_service::{RoomService, RoomServiceDependencies};

#[cfg(test)]
mod test_support;
