use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::date::{
    canonical_day, canonical_month, canonical_time, canonical_year, expand_day_value,
    expand_month_value, expand_time_value, max_day_count,
};
use crate::error::{Error, Result};
use crate::request::{FieldValue, Fields};

/// Serialized query as sent to the archive (without dataset and target).
pub type Params = Map<String, Value>;

pub const ERA5_SINGLE_LEVELS: &str = "reanalysis-era5-single-levels";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductType {
    Reanalysis,
    EnsembleMembers,
    EnsembleMean,
    EnsembleSpread,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Reanalysis => "reanalysis",
            ProductType::EnsembleMembers => "ensemble_members",
            ProductType::EnsembleMean => "ensemble_mean",
            ProductType::EnsembleSpread => "ensemble_spread",
        }
    }
}

impl FromStr for ProductType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "reanalysis" => Ok(ProductType::Reanalysis),
            "ensemble_members" => Ok(ProductType::EnsembleMembers),
            "ensemble_mean" => Ok(ProductType::EnsembleMean),
            "ensemble_spread" => Ok(ProductType::EnsembleSpread),
            other => Err(Error::Validation(format!("unknown product_type: {other:?}"))),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Netcdf,
    Grib,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Netcdf => "netcdf",
            Format::Grib => "grib",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Format::Netcdf => &["nc", "nc4", "netcdf"],
            Format::Grib => &["grib", "grb", "grib1", "grb1"],
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "netcdf" => Ok(Format::Netcdf),
            "grib" => Ok(Format::Grib),
            other => Err(Error::Validation(format!("unknown format: {other:?}"))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box in archive order: north, west, south, east (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    north: f64,
    west: f64,
    south: f64,
    east: f64,
}

impl Area {
    /// Longitudes may run past 180 so boxes crossing the antimeridian keep
    /// `east > west`.
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Result<Self> {
        if ![north, west, south, east].iter().all(|v| v.is_finite()) {
            return Err(Error::Validation("area values must be finite".into()));
        }
        for (name, lat) in [("north", north), ("south", south)] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(Error::Validation(format!(
                    "area {name} latitude {lat} outside -90..90"
                )));
            }
        }
        for (name, lon) in [("west", west), ("east", east)] {
            if !(-180.0..=360.0).contains(&lon) {
                return Err(Error::Validation(format!(
                    "area {name} longitude {lon} outside -180..360"
                )));
            }
        }
        if north <= south {
            return Err(Error::Validation(format!(
                "area north {north} must be greater than south {south}"
            )));
        }
        if east <= west {
            return Err(Error::Validation(format!(
                "area east {east} must be greater than west {west}"
            )));
        }
        if east - west > 360.0 {
            return Err(Error::Validation(format!(
                "area spans {} degrees of longitude",
                east - west
            )));
        }
        Ok(Self {
            north,
            west,
            south,
            east,
        })
    }

    pub fn from_value(value: &FieldValue) -> Result<Self> {
        let v = value.as_numbers()?;
        let [n, w, s, e] = v.as_slice() else {
            return Err(Error::Validation(format!(
                "area needs four values (north/west/south/east), got {}",
                v.len()
            )));
        };
        Self::new(*n, *w, *s, *e)
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.north, self.west, self.south, self.east]
    }

    /// Archive spelling `N/W/S/E`; whole degrees print without a fraction.
    pub fn to_slash_string(&self) -> String {
        format!("{}/{}/{}/{}", self.north, self.west, self.south, self.east)
    }
}

/// Controlled list of variable names accepted for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    dataset: String,
    names: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new<S: Into<String>>(
        dataset: impl Into<String>,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Surface and wave fields of `reanalysis-era5-single-levels`.
    pub fn era5_single_levels() -> Self {
        Self::new(
            ERA5_SINGLE_LEVELS,
            [
                "10m_u_component_of_wind",
                "10m_v_component_of_wind",
                "10m_wind_gust_since_previous_post_processing",
                "2m_dewpoint_temperature",
                "2m_temperature",
                "boundary_layer_height",
                "mean_direction_of_wind_waves",
                "mean_sea_level_pressure",
                "mean_wave_direction",
                "mean_wave_period",
                "peak_wave_period",
                "sea_ice_cover",
                "sea_surface_temperature",
                "significant_height_of_combined_wind_waves_and_swell",
                "significant_height_of_wind_waves",
                "skin_temperature",
                "surface_pressure",
                "surface_solar_radiation_downwards",
                "total_cloud_cover",
                "total_precipitation",
                "u_component_stokes_drift",
                "v_component_stokes_drift",
            ],
        )
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.names.contains(variable)
    }
}

/// A validated, immutable archive query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    dataset: String,
    product_type: ProductType,
    format: Format,
    variables: BTreeSet<String>,
    area: Area,
    year: String,
    months: Vec<String>,
    days: BTreeSet<String>,
    times: BTreeSet<String>,
    target: String,
}

impl QueryDescriptor {
    /// Validate `fields` into a descriptor.
    ///
    /// `variable`, `day` and `time` are sets: repeated values collapse.
    /// `month` keeps its order and rejects repeats. When `vocabulary` is given,
    /// every variable must belong to it.
    pub fn build(fields: &Fields, vocabulary: Option<&Vocabulary>) -> Result<Self> {
        let dataset = single_string(fields, "dataset")?;
        let product_type: ProductType = single_string(fields, "product_type")?.parse()?;
        let format: Format = single_string(fields, "format")?.parse()?;

        let mut variables = BTreeSet::new();
        for v in fields.require("variable")?.as_strings() {
            let v = v.trim();
            if v.is_empty() {
                return Err(Error::Validation("empty variable name".into()));
            }
            variables.insert(v.to_string());
        }
        if variables.is_empty() {
            return Err(Error::Validation("variable list must not be empty".into()));
        }
        if let Some(vocab) = vocabulary {
            if let Some(unknown) = variables.iter().find(|v| !vocab.contains(v)) {
                return Err(Error::UnknownVariable {
                    variable: unknown.clone(),
                    dataset: dataset.clone(),
                });
            }
        }

        let area = Area::from_value(fields.require("area")?)?;

        let year = single_string(fields, "year")?;
        let year_num = canonical_year(&year)?;

        let mut months = Vec::new();
        let mut month_nums = Vec::new();
        for token in tokens(fields.require("month")?, 2)? {
            for m in expand_month_value(&token)? {
                let n = canonical_month(&m)?;
                if month_nums.contains(&n) {
                    return Err(Error::Validation(format!("duplicate month: {m}")));
                }
                month_nums.push(n);
                months.push(m.trim().to_string());
            }
        }
        if months.is_empty() {
            return Err(Error::Validation("month list must not be empty".into()));
        }

        let max_day = max_day_count(year_num, &month_nums)?;
        let mut days = BTreeSet::new();
        for token in tokens(fields.require("day")?, 2)? {
            for d in expand_day_value(&token, max_day)? {
                canonical_day(&d, max_day)?;
                days.insert(d.trim().to_string());
            }
        }
        if days.is_empty() {
            return Err(Error::Validation("day list must not be empty".into()));
        }

        let mut times = BTreeSet::new();
        for token in time_tokens(fields.require("time")?)? {
            for t in expand_time_value(&token)? {
                canonical_time(&t)?;
                times.insert(t.trim().to_string());
            }
        }
        if times.is_empty() {
            return Err(Error::Validation("time list must not be empty".into()));
        }

        let target = single_string(fields, "target")?;
        if target.trim().is_empty() {
            return Err(Error::Validation("target must not be empty".into()));
        }
        if Path::new(&target).is_dir() {
            return Err(Error::Validation(format!("target {target:?} is a directory")));
        }
        let ext = Path::new(&target).extension().and_then(|e| e.to_str()).unwrap_or("");
        if !format.extensions().contains(&ext) {
            warn!(path = %target, %format, "target extension does not match the requested format");
        }

        let descriptor = Self {
            dataset,
            product_type,
            format,
            variables,
            area,
            year,
            months,
            days,
            times,
            target,
        };
        debug!(
            dataset = %descriptor.dataset,
            variables = descriptor.variables.len(),
            months = ?descriptor.months,
            days = descriptor.days.len(),
            times = descriptor.times.len(),
            "built query descriptor"
        );
        Ok(descriptor)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn months(&self) -> &[String] {
        &self.months
    }

    pub fn days(&self) -> &BTreeSet<String> {
        &self.days
    }

    pub fn times(&self) -> &BTreeSet<String> {
        &self.times
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Archive keyword/value mapping for this query.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("product_type".into(), json!(self.product_type.as_str()));
        params.insert("format".into(), json!(self.format.as_str()));
        params.insert("variable".into(), json!(self.variables));
        params.insert("area".into(), json!(self.area.to_slash_string()));
        params.insert("year".into(), json!(self.year));
        params.insert("month".into(), json!(self.months));
        params.insert("day".into(), json!(self.days));
        params.insert("time".into(), json!(self.times));
        params
    }
}

fn single_string(fields: &Fields, key: &str) -> Result<String> {
    let values = fields.require(key)?.as_strings();
    match values.as_slice() {
        [one] => Ok(one.trim().to_string()),
        _ => Err(Error::Validation(format!(
            "{key} expects a single value, got {}",
            values.len()
        ))),
    }
}

// Integers are zero-padded to `width` digits; strings are taken as written.
fn tokens(value: &FieldValue, width: usize) -> Result<Vec<String>> {
    match value {
        FieldValue::Int(i) => Ok(vec![format!("{i:0width$}")]),
        FieldValue::IntList(xs) => Ok(xs.iter().map(|i| format!("{i:0width$}")).collect()),
        FieldValue::Str(s) => Ok(vec![s.clone()]),
        FieldValue::StrList(xs) => Ok(xs.clone()),
        FieldValue::Float(_) | FieldValue::FloatList(_) => Err(Error::Validation(format!(
            "expected integer or string tokens, got {value:?}"
        ))),
    }
}

// Bare integers are hours.
fn time_tokens(value: &FieldValue) -> Result<Vec<String>> {
    match value {
        FieldValue::Int(h) => Ok(vec![format!("{h:02}:00")]),
        FieldValue::IntList(xs) => Ok(xs.iter().map(|h| format!("{h:02}:00")).collect()),
        other => tokens(other, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wind_fields() -> Fields {
        Fields::new()
            .dataset(ERA5_SINGLE_LEVELS)
            .product_type("reanalysis")
            .format("netcdf")
            .variable(["10m_u_component_of_wind"])
            .area([57, 5, 50, 10])
            .year("2017")
            .month(["03", "04"])
            .day(["01", "02"])
            .time(["00:00"])
            .target("era5_wind_201703_04.nc")
    }

    fn set(xs: &[&str]) -> BTreeSet<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_wind_query() {
        let q = QueryDescriptor::build(&wind_fields(), None).unwrap();
        assert_eq!(q.dataset(), ERA5_SINGLE_LEVELS);
        assert_eq!(q.product_type(), ProductType::Reanalysis);
        assert_eq!(q.format(), Format::Netcdf);
        assert_eq!(q.variables(), &set(&["10m_u_component_of_wind"]));
        assert_eq!(q.area().as_array(), [57.0, 5.0, 50.0, 10.0]);
        assert_eq!(q.year(), "2017");
        assert_eq!(q.months(), ["03", "04"]);
        assert_eq!(q.days(), &set(&["01", "02"]));
        assert_eq!(q.times(), &set(&["00:00"]));
        assert_eq!(q.target(), "era5_wind_201703_04.nc");
    }

    #[test]
    fn build_is_idempotent() {
        let fields = wind_fields();
        let a = QueryDescriptor::build(&fields, None).unwrap();
        let b = QueryDescriptor::build(&fields, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicates_collapse_in_sets() {
        let fields = wind_fields()
            .variable(["mean_wave_period", "mean_wave_period", "sea_ice_cover"])
            .day(["20", "20"])
            .time(["06:00", "00:00", "06:00"]);
        let q = QueryDescriptor::build(&fields, None).unwrap();
        assert_eq!(q.variables(), &set(&["mean_wave_period", "sea_ice_cover"]));
        assert_eq!(q.days(), &set(&["20"]));
        assert_eq!(q.times(), &set(&["00:00", "06:00"]));
    }

    #[test]
    fn empty_variables_rejected() {
        let fields = wind_fields().variable(Vec::<String>::new());
        let err = QueryDescriptor::build(&fields, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn out_of_range_days_rejected() {
        for bad in ["00", "32", "99", "1", "2021", "xx"] {
            let fields = wind_fields().day(["01", bad]);
            let err = QueryDescriptor::build(&fields, None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "day {bad}: {err}");
        }
    }

    #[test]
    fn oversized_ranges_rejected_without_expanding() {
        let fields = wind_fields().day("9223372036854775806/to/9223372036854775807");
        assert!(matches!(
            QueryDescriptor::build(&fields, None),
            Err(Error::Validation(_))
        ));
        let fields = wind_fields().month("1/to/20000000");
        assert!(matches!(
            QueryDescriptor::build(&fields, None),
            Err(Error::Validation(_))
        ));
        let fields = wind_fields().time("0/to/9223372036854775807/by/6");
        assert!(matches!(
            QueryDescriptor::build(&fields, None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn fractional_area_keeps_decimals() {
        let fields = wind_fields().area([57.25, 5.5, 50.0, 10.0]);
        let q = QueryDescriptor::build(&fields, None).unwrap();
        assert_eq!(q.params()["area"], json!("57.25/5.5/50/10"));
    }

    #[test]
    fn day_beyond_requested_months_rejected() {
        let fields = wind_fields().month(["04"]).day(["31"]);
        assert!(matches!(
            QueryDescriptor::build(&fields, None),
            Err(Error::Validation(_))
        ));
        // March has 31 days, so the pair is fine.
        let fields = wind_fields().day(["31"]);
        assert!(QueryDescriptor::build(&fields, None).is_ok());
    }

    #[test]
    fn months_keep_order_and_reject_repeats() {
        let q = QueryDescriptor::build(&wind_fields().month(["04", "03"]), None).unwrap();
        assert_eq!(q.months(), ["04", "03"]);

        let err = QueryDescriptor::build(&wind_fields().month(["03", "03"]), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(QueryDescriptor::build(&wind_fields().month(["13"]), None).is_err());
    }

    #[test]
    fn non_four_digit_year_rejected() {
        for bad in ["17", "02017", "year"] {
            assert!(
                QueryDescriptor::build(&wind_fields().year(bad), None).is_err(),
                "year {bad}"
            );
        }
        assert!(QueryDescriptor::build(&wind_fields().year(2017), None).is_ok());
    }

    #[test]
    fn area_must_have_north_above_south() {
        for area in [[50, 5, 57, 10], [50, 5, 50, 10]] {
            let err = QueryDescriptor::build(&wind_fields().area(area), None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{area:?}");
        }
        // The literal area of the sea-ice script lists south before north.
        assert!(QueryDescriptor::build(&wind_fields().area("70/0/85/40"), None).is_err());
    }

    #[test]
    fn area_rejects_degenerate_and_out_of_range_boxes() {
        assert!(Area::new(57.0, 10.0, 50.0, 10.0).is_err());
        assert!(Area::new(91.0, 5.0, 50.0, 10.0).is_err());
        assert!(Area::new(57.0, -190.0, 50.0, 10.0).is_err());
        assert!(Area::new(f64::NAN, 5.0, 50.0, 10.0).is_err());
        assert!(Area::new(10.0, 170.0, -10.0, 190.0).is_ok());
        assert!(QueryDescriptor::build(&wind_fields().area([57, 5, 50]), None).is_err());
    }

    #[test]
    fn area_accepts_slash_string() {
        let q = QueryDescriptor::build(&wind_fields().area("57/5/50/10"), None).unwrap();
        assert_eq!(q.area(), Area::new(57.0, 5.0, 50.0, 10.0).unwrap());
    }

    #[test]
    fn bad_times_rejected() {
        for bad in ["24:00", "00:30", "noon"] {
            assert!(
                QueryDescriptor::build(&wind_fields().time([bad]), None).is_err(),
                "time {bad}"
            );
        }
    }

    #[test]
    fn generated_day_and_time_ranges() {
        let q = QueryDescriptor::build(&wind_fields().all_days().all_times(), None).unwrap();
        assert_eq!(q.days().len(), 31);
        assert_eq!(q.times().len(), 24);

        let fields = wind_fields().year("2014").month(["02"]).all_days();
        let q = QueryDescriptor::build(&fields, None).unwrap();
        assert_eq!(q.days().len(), 28);
        assert_eq!(q.days().iter().next_back().map(String::as_str), Some("28"));

        let q = QueryDescriptor::build(&wind_fields().day("1/to/6").time(6), None).unwrap();
        assert_eq!(q.days(), &set(&["01", "02", "03", "04", "05", "06"]));
        assert_eq!(q.times(), &set(&["06:00"]));
    }

    #[test]
    fn missing_field_rejected() {
        let mut fields = wind_fields();
        fields.remove("time");
        let err = QueryDescriptor::build(&fields, None).unwrap_err();
        assert_eq!(err.to_string(), "invalid query: missing required field: time");
    }

    #[test]
    fn unknown_product_type_and_format_rejected() {
        assert!(QueryDescriptor::build(&wind_fields().product_type("forecast"), None).is_err());
        assert!(QueryDescriptor::build(&wind_fields().format("csv"), None).is_err());
    }

    #[test]
    fn target_checks() {
        assert!(QueryDescriptor::build(&wind_fields().target(""), None).is_err());

        let dir = tempfile::tempdir().unwrap();
        let as_dir = dir.path().to_string_lossy().to_string();
        let err = QueryDescriptor::build(&wind_fields().target(as_dir), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let in_dir = dir.path().join("out.nc").to_string_lossy().to_string();
        assert!(QueryDescriptor::build(&wind_fields().target(in_dir), None).is_ok());
    }

    #[test]
    fn vocabulary_checked_only_when_given() {
        let fields = wind_fields().variable(["10m_u_component_of_wind", "made_up_field"]);
        assert!(QueryDescriptor::build(&fields, None).is_ok());

        let vocab = Vocabulary::era5_single_levels();
        match QueryDescriptor::build(&fields, Some(&vocab)) {
            Err(Error::UnknownVariable { variable, dataset }) => {
                assert_eq!(variable, "made_up_field");
                assert_eq!(dataset, ERA5_SINGLE_LEVELS);
            }
            other => panic!("expected unknown variable, got {other:?}"),
        }
        assert!(QueryDescriptor::build(&wind_fields(), Some(&vocab)).is_ok());
    }

    #[test]
    fn config_style_fields_build() {
        let fields = Fields::from_str_pairs([
            ("dataset", ERA5_SINGLE_LEVELS),
            ("product_type", "reanalysis"),
            ("format", "netcdf"),
            ("variable", "10m_u_component_of_wind,sea_ice_cover"),
            ("area", "57/5/50/10"),
            ("year", "2017"),
            ("month", "03,04"),
            ("day", "all"),
            ("time", "0/to/23"),
            ("target", "out.nc"),
        ]);
        let q = QueryDescriptor::build(&fields, None).unwrap();
        assert_eq!(q.variables().len(), 2);
        assert_eq!(q.days().len(), 31);
        assert_eq!(q.times().len(), 24);
    }

    #[test]
    fn params_use_archive_keywords() {
        let q = QueryDescriptor::build(&wind_fields(), None).unwrap();
        let p = Value::Object(q.params());
        assert_eq!(
            p,
            json!({
                "product_type": "reanalysis",
                "format": "netcdf",
                "variable": ["10m_u_component_of_wind"],
                "area": "57/5/50/10",
                "year": "2017",
                "month": ["03", "04"],
                "day": ["01", "02"],
                "time": ["00:00"],
            })
        );
    }
}
