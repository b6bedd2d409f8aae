//! Tool implementations assembled into the live [`broker_tool::ToolRegistry`]
//! (spec §4.3 "Registry").

pub mod chat;
pub mod count_tokens;
pub mod jobs;
pub mod memory;
