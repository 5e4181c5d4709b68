//! 链路统计
//!
//! 每条瓶颈链路的统计状态机、占用历史与链路查找。

mod history;
mod registry;
mod snapshot;
mod state;

pub use history::{OccupancyHistory, OccupancyPoint};
pub use registry::{read_link, shared, write_link, LinkLookup, LinkRegistry, SharedLink};
pub use snapshot::LinkSnapshot;
pub use state::{bits_per_sec, Counters, InstantValues, LinkStatState};
