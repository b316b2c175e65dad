pub mod console;
pub mod offline;
pub mod online;
