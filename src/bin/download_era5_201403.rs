//! Hourly ERA5 wind, pressure and sea-ice cover for 1-6 March 2014.

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
            "sea_ice_cover",
        ])
        // north/west/south/east: 70N-85N, 0E-40E
        .area("85/0/70/40")
        .year("2014")
        .month(["03"])
        .day("1/to/6")
        .all_times()
        .target("era5_wind_20140301_06.nc");

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
