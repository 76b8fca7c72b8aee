mod common;
mod orchestrator;
mod resolver;
