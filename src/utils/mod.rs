pub mod command_log;
