pub mod rate_limit;
pub mod sms_gateway;
pub mod telegram;
