pub mod chat;
pub mod database;
pub mod game_data;
pub mod media;
pub mod rbmq;
pub mod redis;
