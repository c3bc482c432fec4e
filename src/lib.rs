pub mod api;
pub mod config;
pub mod edit_diff;
pub mod error;
pub mod state;
#[cfg(test)]
mod test_support;
pub mod tool_preview;
pub mod tools;
pub mod types;
pub mod util;
