use unified_events::configuration::get_configuration;
use unified_events::startup::Application;
use unified_events::telemetry::get_subscriber;
use unified_events::telemetry::init_subscriber;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("unified-events", "info", std::io::stdout);
    init_subscriber(subscriber);

    let cfg = get_configuration().expect("failed to read configuration");
    let application = Application::build(cfg).await?;
    application.run_until_stopped().await?;

    Ok(())
}
