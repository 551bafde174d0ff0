pub mod backup_scheduler;
pub mod backup_service;
pub mod monitor_service;
