pub mod cmd_check;
pub mod cmd_replay;
