pub mod account_service;
pub mod run_service;
pub mod session_service;
pub mod stats;
