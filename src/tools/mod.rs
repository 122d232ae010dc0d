//! Local tools the model can call during a chat exchange.
//!
//! - `datetime`: current time and calendar-aware duration arithmetic
//! - `registry`: schema declaration and dispatch
//! - `error`: tool failure taxonomy

pub mod datetime;
pub mod error;
pub mod registry;

pub use datetime::{
    AddDurationTool, Clock, CurrentDateTimeTool, DurationUnit, add_duration,
    add_duration_to_datetime, days_in_month, format_datetime, get_current_datetime,
    is_leap_year, parse_datetime, system_clock,
};
pub use error::{ToolError, ToolsResult};
pub use registry::{Tool, ToolRegistry, ToolSchema};
