pub mod chat;
pub mod cli;
pub mod client;
pub mod core;
pub mod storage;
pub mod voice;
