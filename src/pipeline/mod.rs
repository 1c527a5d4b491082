pub mod orchestrator;
pub mod translator;
