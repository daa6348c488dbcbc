use trimlink::{
    startup,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("trimlink".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);
    startup::run().await
}
