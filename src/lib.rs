#![forbid(unsafe_code)]

//! Validated ERA5 queries and a blocking client for the Copernicus Climate
//! Data Store.
//!
//! A query is assembled as keyword/value [`Fields`] using the archive's own
//! keyword names, checked into an immutable [`QueryDescriptor`], and then
//! handed to a retrieval function with [`submit`]. The bundled [`Client`] is
//! one such function: it posts the request, waits for the archive task to
//! finish and writes the result file.
//!
//! **Quick start**
//! ```no_run
//! use era5_download::{Client, ClientOptions, Fields, QueryDescriptor, Vocabulary};
//!
//! let fields = Fields::new()
//!     .dataset("reanalysis-era5-single-levels")
//!     .product_type("reanalysis")
//!     .format("netcdf")
//!     .variable(["10m_u_component_of_wind", "10m_v_component_of_wind"])
//!     .area("57/5/50/10")
//!     .year("2017")
//!     .month(["03", "04"])
//!     .all_days()
//!     .all_times()
//!     .target("era5_wind_201703_04.nc");
//! let query = QueryDescriptor::build(&fields, Some(&Vocabulary::era5_single_levels()))?;
//!
//! let client = Client::new(ClientOptions::load()?)?;
//! let result = client.submit(&query)?;
//! println!("{} bytes in {}", result.output.size_bytes, result.target);
//! # Ok::<(), era5_download::Error>(())
//! ```
//!
//! **Custom collaborator**
//! ```
//! use era5_download::{Fields, QueryDescriptor, submit};
//!
//! let query = QueryDescriptor::build(
//!     &Fields::from_str_pairs([
//!         ("dataset", "reanalysis-era5-single-levels"),
//!         ("product_type", "reanalysis"),
//!         ("format", "netcdf"),
//!         ("variable", "sea_ice_cover"),
//!         ("area", "85/0/70/40"),
//!         ("year", "2014"),
//!         ("month", "03"),
//!         ("day", "1/to/6"),
//!         ("time", "all"),
//!         ("target", "ice.nc"),
//!     ]),
//!     None,
//! )?;
//! let done = submit(&query, |dataset, params, _target| {
//!     assert_eq!(dataset, "reanalysis-era5-single-levels");
//!     Ok::<_, era5_download::Error>(params.len())
//! })?;
//! assert_eq!(done.target, "ice.nc");
//! # Ok::<(), era5_download::Error>(())
//! ```
//!
//! Notes:
//! - Archive access needs a registered account; the key goes into
//!   `~/.cdsapirc` or `CDSAPI_KEY` as `UID:KEY`.
//! - Large requests wait in the archive queue; `submit` blocks until done.

mod client;
mod date;
mod descriptor;
mod error;
mod request;
mod sources;
mod submit;
mod url_builder;

pub use crate::client::{Client, ClientOptions, Download};
pub use crate::descriptor::{
    Area, ERA5_SINGLE_LEVELS, Format, Params, ProductType, QueryDescriptor, Vocabulary,
};
pub use crate::error::{Error, Result};
pub use crate::request::{FieldValue, Fields};
pub use crate::submit::{Retrieval, submit};
