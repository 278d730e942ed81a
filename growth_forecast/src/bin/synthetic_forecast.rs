use growth_forecast::config::{DataMode, EngineConfig};
use growth_forecast::domain::Subject;
use growth_forecast::error::Result;
use growth_forecast::facade::PredictionFacade;
use growth_forecast::telemetry::init_tracing;
use growth_forecast::utils::now_seconds;

const HORIZON_DAYS: usize = 14;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let mut config = EngineConfig::load()?;
    config.data_mode = DataMode::Synthetic;
    tracing::info!(
        history_days = config.history_days,
        seed = ?config.random_seed,
        "running synthetic forecast"
    );

    let facade = PredictionFacade::new(config);
    let end = now_seconds();
    for subject in Subject::ALL {
        let forecast = facade.forecast_subject(subject, HORIZON_DAYS, end).await;
        println!("{}", forecast.to_json()?);
    }

    Ok(())
}
