pub const TOPIC_CONTROLLER_STATUS: &str = "nightcharge/controller/status";
pub const TOPIC_CONTROLLER_CYCLE: &str = "nightcharge/controller/cycle";

pub const TOPIC_CMD_CYCLE: &str = "nightcharge/cmnd/cycle";
