pub mod deploy;
pub mod mcp;
pub mod run;
