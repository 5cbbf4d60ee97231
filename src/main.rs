use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(error) = subscription_tracker::run().await {
        error!("Subscription tracker exited with error: {:#}", error);
        std::process::exit(1);
    }
}
