pub mod deck;
pub mod engine;
pub mod profile;
pub mod records;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod storage;
pub mod timer;
