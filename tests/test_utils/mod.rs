//! Test Utilities and Mocks
//!
//! Scripted programs and fixtures shared by the integration suites. Include
//! with `#[path = "../test_utils/mod.rs"] mod test_utils;`.

#![allow(dead_code, unused_imports)]


// Re-exports for convenience
pub use fixtures::{assert_close, lua_simulator, scripted_simulator, test_config};
pub use mock_program::{ScriptStep, ScriptedCompiler, StepProbe};
