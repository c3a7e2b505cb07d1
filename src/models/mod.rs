pub mod admin;
pub mod money;
pub mod payment;
pub mod sms_log;
pub mod user;
