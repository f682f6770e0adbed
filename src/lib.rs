pub mod calc;
pub mod db;
pub mod grading;
pub mod interactive;
pub mod ipc;
pub mod report;
pub mod results;
pub mod setup;
