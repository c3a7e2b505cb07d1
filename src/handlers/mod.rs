pub(crate) mod admin;
pub(crate) mod payments;
pub(crate) mod sms;
pub(crate) mod users;
