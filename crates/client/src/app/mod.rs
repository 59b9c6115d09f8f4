pub(crate) mod bootstrap;
pub(crate) mod commands;
pub(crate) mod config;
pub(crate) mod loop_runner;
