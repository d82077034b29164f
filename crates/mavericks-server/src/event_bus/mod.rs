// Event Bus
//
// In-process broker routing domain events to agents. Delivery is synchronous,
// history is a bounded ring buffer and failed deliveries go to a dead-letter
// queue that a background task ages out.

pub mod bus;
pub mod clock;
pub mod dead_letter;
pub mod types;

pub use bus::{BusConfig, BusError, EventAnalytics, EventBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dead_letter::{DeadLetterQueue, FailedDelivery};
pub use types::{Event, SYSTEM_SOURCE};
