pub mod health;
pub mod tickets_cmd;
