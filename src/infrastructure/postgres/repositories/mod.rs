pub mod subscription_prices;
pub mod subscriptions;
