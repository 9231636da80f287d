pub mod cli;
pub mod experiment;
