pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod schema;
pub mod services;
pub mod stage;
pub mod status;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;
