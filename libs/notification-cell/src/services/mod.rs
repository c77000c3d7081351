pub mod emitter;
pub mod sink;
pub mod store;

pub use emitter::NotificationEmitter;
pub use sink::{NotificationSink, SqliteNotificationSink};
pub use store::NotificationStore;
