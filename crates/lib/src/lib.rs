//! linerelay core library: LINE webhook verification, event dispatch, and the Gemini completion relay
//! used by the CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod relay;
