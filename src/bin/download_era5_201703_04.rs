//! Hourly ERA5 wind, pressure and wave fields over the German Bight for
//! March and April 2017.

use anyhow::{Context, Result};
use era5_download::{Client, ERA5_SINGLE_LEVELS, Fields, QueryDescriptor, Vocabulary};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let fields = Fields::new()
        .dataset(ERA5_SINGLE_LEVELS)
        .product_type("reanalysis")
        .format("netcdf")
        .variable([
            "10m_u_component_of_wind",
            "10m_v_component_of_wind",
            "mean_sea_level_pressure",
            "mean_direction_of_wind_waves",
            "mean_wave_direction",
            "mean_wave_period",
            "peak_wave_period",
            "significant_height_of_combined_wind_waves_and_swell",
            "significant_height_of_wind_waves",
            "u_component_stokes_drift",
            "v_component_stokes_drift",
        ])
        // north/west/south/east
        .area("57/5/50/10")
        .year("2017")
        .month(["03", "04"])
        .all_days()
        .all_times()
        .target("era5_wind_201703_04.nc");

    let query = QueryDescriptor::build(&fields, Some(&Vocabulary::era5_single_levels()))
        .context("invalid ERA5 query")?;
    let client = Client::from_env().context("cannot configure archive client")?;
    let done = client.submit(&query)?;

    info!(
        path = %done.target,
        size_bytes = done.output.size_bytes,
        "saved"
    );
    Ok(())
}
