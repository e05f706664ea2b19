pub mod chat;
pub mod config_cmd;
pub mod distill;
pub mod init;
pub mod serve;
pub mod status;
