pub mod admin;
pub mod payments;
pub mod sms;
pub mod users;
