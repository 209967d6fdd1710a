//! Data points, batches and their InfluxDB line protocol encoding.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A single field value carried by a point
///
/// Floats are written without a type suffix; integers carry `i`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}i", v),
        }
    }
}

/// A time-series data point
///
/// Tags and fields are kept in `BTreeMap`s so the encoded line is stable
/// (sorted by key), which is also the order InfluxDB prefers for tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// Nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp_ns: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp_ns,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Append this point as one line of line protocol (without trailing newline)
    pub fn write_line(&self, out: &mut String) {
        escape_into(out, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        let mut first = true;
        for (key, value) in &self.fields {
            out.push(if first { ' ' } else { ',' });
            first = false;
            escape_into(out, key, &[',', '=', ' ']);
            // Writing to a String never fails.
            let _ = write!(out, "={}", value);
        }

        let _ = write!(out, " {}", self.timestamp_ns);
    }

    pub fn to_line(&self) -> String {
        let mut line = String::new();
        self.write_line(&mut line);
        line
    }
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// A group of points submitted to the sink in one write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub points: Vec<Point>,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encode every point, newline-separated, as the body of a write request
    pub fn to_line_protocol(&self) -> String {
        let mut body = String::with_capacity(self.points.len() * 64);
        for point in &self.points {
            point.write_line(&mut body);
            body.push('\n');
        }
        body
    }
}
