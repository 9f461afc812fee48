mod clock;
mod driver;
mod engine;
mod phase;
mod scenario;

pub use clock::{format_time_left, local_date, Clock, ElapsedClock, ManualClock, SystemClock};
pub use driver::{TimerDriver, TICK_INTERVAL};
pub use engine::{
    Lifecycle, ScheduledStart, SessionState, TimerEngine, AUTO_START_DELAY_MS,
    COMPLETION_COOLDOWN_MS,
};
pub use phase::{resolve_duration, Phase};
pub use scenario::{Scenario, Sequencer, StepsMode};
