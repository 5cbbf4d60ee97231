pub mod months;
pub mod subscriptions;
