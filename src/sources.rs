/// Built-in archive endpoints of the Copernicus data stores.
///
/// If `source` is already an `http(s)` URL, it is used as-is.
pub fn source_to_base_url(source: &str) -> Option<&'static str> {
    match source {
        "cds" => Some("https://cds.climate.copernicus.eu/api/v2"),
        "ads" => Some("https://ads.atmosphere.copernicus.eu/api/v2"),
        _ => None,
    }
}

pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
