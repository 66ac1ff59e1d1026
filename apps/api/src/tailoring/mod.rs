pub mod client;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod telemetry;
pub mod validation;
