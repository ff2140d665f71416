use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Value type for a query keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::StrList(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FieldValue {
    fn from(value: [&str; N]) -> Self {
        FieldValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(value: Vec<i64>) -> Self {
        FieldValue::IntList(value)
    }
}

impl<const N: usize> From<[i32; N]> for FieldValue {
    fn from(value: [i32; N]) -> Self {
        FieldValue::IntList(value.into_iter().map(|x| x as i64).collect())
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(value: Vec<f64>) -> Self {
        FieldValue::FloatList(value)
    }
}

impl<const N: usize> From<[f64; N]> for FieldValue {
    fn from(value: [f64; N]) -> Self {
        FieldValue::FloatList(value.to_vec())
    }
}

impl FieldValue {
    /// Parse a user-provided string into a best-effort [`FieldValue`].
    ///
    /// Meant for config-file inputs where everything starts as a string.
    ///
    /// Rules:
    /// - `"2017"` -> `Int(2017)`, `"57.5"` -> `Float(57.5)`
    /// - `"a,b,c"` -> `StrList([..])`
    /// - `"1,10,20"` -> `IntList([..])`, `"[57, 5.5]"` -> `FloatList([..])`
    /// - Otherwise -> `Str(..)`
    ///
    /// Zero-padded tokens such as `"03"` stay strings so month/day/time
    /// spellings survive. Range syntaxes like `"1/to/31"` and slash areas like
    /// `"57/5/50/10"` are also kept as strings and expanded during validation.
    pub fn parse_auto(s: &str) -> Self {
        let mut t = s.trim();
        if t.starts_with('[') && t.ends_with(']') && t.len() >= 2 {
            t = t[1..t.len() - 1].trim();
        }

        if t.contains(',') {
            let items: Vec<&str> = t
                .split(',')
                .map(|x| x.trim().trim_matches(|c| c == '"' || c == '\''))
                .filter(|x| !x.is_empty())
                .collect();
            if items.is_empty() {
                return FieldValue::StrList(Vec::new());
            }

            let ints: Option<Vec<i64>> = items.iter().map(|x| parse_plain_int(x)).collect();
            if let Some(ints) = ints {
                return FieldValue::IntList(ints);
            }
            if let Some(floats) = items
                .iter()
                .map(|x| parse_plain_int(x).map(|i| i as f64).or_else(|| parse_plain_float(x)))
                .collect::<Option<Vec<_>>>()
            {
                return FieldValue::FloatList(floats);
            }
            FieldValue::StrList(items.into_iter().map(|x| x.to_string()).collect())
        } else if let Some(v) = parse_plain_int(t) {
            FieldValue::Int(v)
        } else if let Some(v) = parse_plain_float(t) {
            FieldValue::Float(v)
        } else {
            FieldValue::Str(t.to_string())
        }
    }

    pub fn as_strings(&self) -> Vec<String> {
        match self {
            FieldValue::Str(s) => vec![s.clone()],
            FieldValue::Int(i) => vec![i.to_string()],
            FieldValue::Float(f) => vec![f.to_string()],
            FieldValue::StrList(xs) => xs.clone(),
            FieldValue::IntList(xs) => xs.iter().map(|x| x.to_string()).collect(),
            FieldValue::FloatList(xs) => xs.iter().map(|x| x.to_string()).collect(),
        }
    }

    /// Numeric view of the value; string items are parsed, so `"57/5/50/10"`
    /// and `["57", "5"]` both work.
    pub fn as_numbers(&self) -> Result<Vec<f64>> {
        let items = match self {
            FieldValue::Int(i) => return Ok(vec![*i as f64]),
            FieldValue::Float(f) => return Ok(vec![*f]),
            FieldValue::IntList(xs) => return Ok(xs.iter().map(|x| *x as f64).collect()),
            FieldValue::FloatList(xs) => return Ok(xs.clone()),
            FieldValue::Str(s) => s.split('/').map(str::to_string).collect::<Vec<_>>(),
            FieldValue::StrList(xs) => xs.clone(),
        };
        items
            .iter()
            .map(|x| {
                x.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::Validation(format!("not a number: {x:?}")))
            })
            .collect()
    }
}

// Leading zeros mark a token (e.g. month "03"), not a number.
fn parse_plain_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

fn parse_plain_float(s: &str) -> Option<f64> {
    if !s.contains('.') {
        return None;
    }
    s.parse().ok()
}

/// Keyword/value pairs describing one archive query, before validation.
///
/// Keywords use the archive's own names (`product_type`, `variable`, `day`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    pub(crate) inner: BTreeMap<String, FieldValue>,
}

impl Fields {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Insert a keyword/value pair (value can be a scalar or list).
    pub fn kw(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    /// Construct fields from an iterator of keyword/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut f = Self::new();
        for (k, v) in pairs {
            f = f.kw(k, v);
        }
        f
    }

    /// Construct fields from string pairs (typical for config inputs).
    /// Values are parsed with [`FieldValue::parse_auto`].
    pub fn from_str_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut f = Self::new();
        for (k, v) in pairs {
            f = f.kw(k, FieldValue::parse_auto(v.as_ref()));
        }
        f
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn dataset(self, v: impl Into<FieldValue>) -> Self {
        self.kw("dataset", v)
    }

    pub fn product_type(self, v: impl Into<FieldValue>) -> Self {
        self.kw("product_type", v)
    }

    pub fn format(self, v: impl Into<FieldValue>) -> Self {
        self.kw("format", v)
    }

    pub fn variable(self, v: impl Into<FieldValue>) -> Self {
        self.kw("variable", v)
    }

    pub fn area(self, v: impl Into<FieldValue>) -> Self {
        self.kw("area", v)
    }

    pub fn year(self, v: impl Into<FieldValue>) -> Self {
        self.kw("year", v)
    }

    pub fn month(self, v: impl Into<FieldValue>) -> Self {
        self.kw("month", v)
    }

    pub fn day(self, v: impl Into<FieldValue>) -> Self {
        self.kw("day", v)
    }

    /// Every day of the requested months, generated during validation.
    pub fn all_days(self) -> Self {
        self.kw("day", "all")
    }

    pub fn time(self, v: impl Into<FieldValue>) -> Self {
        self.kw("time", v)
    }

    /// Every whole hour, `00:00` to `23:00`.
    pub fn all_times(self) -> Self {
        self.kw("time", "all")
    }

    pub fn target(self, v: impl Into<FieldValue>) -> Self {
        self.kw("target", v)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.inner.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.inner.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.inner.iter()
    }

    pub(crate) fn require(&self, key: &str) -> Result<&FieldValue> {
        self.inner
            .get(key)
            .ok_or_else(|| Error::Validation(format!("missing required field: {key}")))
    }
}

/// Expand a numeric range token such as `"1/to/31"` or `"0/to/18/by/6"`,
/// zero-padding every element to `width` digits.
///
/// Both ends must lie within `0..=limit`. Anything that is not range syntax
/// is returned unchanged as a single item.
pub fn expand_numeric_syntax(s: &str, width: usize, limit: i64) -> Result<Vec<String>> {
    let tokens: Vec<&str> = s.split('/').map(str::trim).filter(|t| !t.is_empty()).collect();
    let is_to = tokens.len() == 3 && tokens[1].eq_ignore_ascii_case("to");
    let is_to_by = tokens.len() == 5
        && tokens[1].eq_ignore_ascii_case("to")
        && tokens[3].eq_ignore_ascii_case("by");
    if !is_to && !is_to_by {
        return Ok(vec![s.to_string()]);
    }

    let parse = |t: &str, what: &str| -> Result<i64> {
        t.parse()
            .map_err(|_| Error::Validation(format!("cannot parse range {what} in {s:?}")))
    };
    let start = parse(tokens[0], "start")?;
    let end = parse(tokens[2], "end")?;
    let by = if is_to_by { parse(tokens[4], "step")? } else { 1 };

    if by <= 0 {
        return Err(Error::Validation(format!("range step must be >0, got {by}")));
    }
    if end < start {
        return Err(Error::Validation(format!("range end {end} < start {start}")));
    }
    if start < 0 || end > limit {
        return Err(Error::Validation(format!(
            "range {start}..{end} outside 0..{limit} in {s:?}"
        )));
    }

    let mut out = Vec::new();
    let mut cur = start;
    while cur <= end {
        out.push(format!("{cur:0width$}"));
        match cur.checked_add(by) {
            Some(next) => cur = next,
            None => break,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod parse_tests {
    use super::{FieldValue, Fields};

    #[test]
    fn parse_auto_scalars() {
        assert_eq!(FieldValue::parse_auto("2017"), FieldValue::Int(2017));
        assert_eq!(FieldValue::parse_auto("57.5"), FieldValue::Float(57.5));
        assert_eq!(FieldValue::parse_auto("netcdf"), FieldValue::Str("netcdf".to_string()));
        // Padded tokens keep their spelling.
        assert_eq!(FieldValue::parse_auto("03"), FieldValue::Str("03".to_string()));
    }

    #[test]
    fn parse_auto_lists() {
        assert_eq!(
            FieldValue::parse_auto("[57, 5, 50, 10]"),
            FieldValue::IntList(vec![57, 5, 50, 10])
        );
        assert_eq!(
            FieldValue::parse_auto("57.5, 5"),
            FieldValue::FloatList(vec![57.5, 5.0])
        );
        assert_eq!(
            FieldValue::parse_auto("['03', '04']"),
            FieldValue::StrList(vec!["03".to_string(), "04".to_string()])
        );
        assert_eq!(
            FieldValue::parse_auto("00:00,12:00"),
            FieldValue::StrList(vec!["00:00".to_string(), "12:00".to_string()])
        );
    }

    #[test]
    fn as_numbers_accepts_slash_areas() {
        assert_eq!(
            FieldValue::parse_auto("57/5/50/10").as_numbers().unwrap(),
            vec![57.0, 5.0, 50.0, 10.0]
        );
        assert!(FieldValue::from("57/x/50/10").as_numbers().is_err());
    }

    #[test]
    fn from_str_pairs_builds_fields() {
        let f = Fields::from_str_pairs([("year", "2017"), ("month", "03,04")]);
        assert_eq!(f.get("year"), Some(&FieldValue::Int(2017)));
        assert_eq!(
            f.get("month"),
            Some(&FieldValue::StrList(vec!["03".to_string(), "04".to_string()]))
        );
    }

    #[test]
    fn require_reports_missing_keyword() {
        let err = Fields::new().require("area").unwrap_err();
        assert_eq!(err.to_string(), "invalid query: missing required field: area");
    }
}
