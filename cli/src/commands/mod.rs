pub mod chat;
pub mod health;
pub mod refine;
pub mod scenarios;
pub mod solutions;
pub mod system;
pub mod watch;
