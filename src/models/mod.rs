pub mod alert;
pub mod audit;
pub mod chat;
pub mod job;
pub mod retry;
pub mod schedule;
pub mod status;
