//! Logical clocks for triadb
//!
//! Every write obtains its timestamp from a clock before touching the
//! triple store. Two interchangeable variants share one contract:
//!
//! - `MemoryClock` starts fresh each process lifetime
//! - `DurableClock` persists its last-issued counter and resumes from the
//!   stored high-water mark on restart
//!
//! Both guarantee that each tick yields a counter strictly greater than all
//! prior ticks from the same instance. Cross-replica comparison is handled
//! entirely by the `Timestamp` total order.

mod durable;
mod errors;
mod memory;
mod timestamp;

pub use durable::DurableClock;
pub use errors::{ClockError, ClockResult};
pub use memory::MemoryClock;
pub use timestamp::Timestamp;

/// The tick/compare contract shared by all clock variants.
pub trait Clock {
    /// Issues a timestamp strictly greater than every prior tick from this
    /// instance. Durable variants persist the counter before returning.
    fn tick(&mut self) -> ClockResult<Timestamp>;

    /// The replica id stamped onto issued timestamps.
    fn replica_id(&self) -> &str;

    /// The last counter value issued (zero if none yet).
    fn last_issued(&self) -> u64;
}
