use crate::{config::TRIGGER_RESET_TIME, schedule::TimeOfDay, types::TriggerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Start today's decision cycle now.
    RunCycle,
    /// The day rolled over; tomorrow's cycle is armed again.
    Rearmed,
    None,
}

/// Fires the decision cycle once per calendar day on a fast tick.
///
/// Ticks are compared at minute resolution. The state lives only in memory, so
/// a restart starts over in `Idle`.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    fetch_time: TimeOfDay,
    reset_time: TimeOfDay,
    state: TriggerState,
}

impl DailyTrigger {
    pub fn new(fetch_time: TimeOfDay) -> Self {
        Self {
            fetch_time,
            reset_time: TRIGGER_RESET_TIME,
            state: TriggerState::Idle,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn has_run_today(&self) -> bool {
        self.state == TriggerState::RanToday
    }

    pub fn fetch_time(&self) -> TimeOfDay {
        self.fetch_time
    }

    pub fn tick(&mut self, now: TimeOfDay) -> TriggerAction {
        let minute = now.minute_of_day();

        match self.state {
            TriggerState::Idle if minute == self.fetch_time.minute_of_day() => {
                self.state = TriggerState::RanToday;
                TriggerAction::RunCycle
            }
            TriggerState::RanToday if minute == self.reset_time.minute_of_day() => {
                self.state = TriggerState::Idle;
                TriggerAction::Rearmed
            }
            _ => TriggerAction::None,
        }
    }

    /// One-off check at process start: catches up when today's fetch time has
    /// already passed.
    pub fn startup(&mut self, now: TimeOfDay) -> TriggerAction {
        if self.state == TriggerState::Idle
            && now.minute_of_day() >= self.fetch_time.minute_of_day()
        {
            self.state = TriggerState::RanToday;
            return TriggerAction::RunCycle;
        }
        TriggerAction::None
    }
}
