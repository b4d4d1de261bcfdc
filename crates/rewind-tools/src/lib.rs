//! Rewind Tools Library
//!
//! Re-executes the tool calls of a recorded agent session against a live
//! workspace. Each supported tool is simulated with the semantics the agent
//! runtime enforces (read-before-write, edit uniqueness, structured
//! rejections) so a replayed session either reproduces the recording or
//! surfaces the drift.

pub mod simulator;

pub use simulator::{SimulationResult, ToolSimulator, TOOL_USE_ERROR_MARKER};
