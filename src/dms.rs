use serde_derive::{Deserialize, Serialize};

pub const MAX_LAT_DEGREES: u32 = 90;
pub const MAX_LON_DEGREES: u32 = 180;
pub const MAX_MINUTES_SECONDS: u32 = 59;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmsTriple {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl DmsTriple {
    pub fn to_decimal(&self, negative: bool) -> f64 {
        let d = self.degrees as f64 + self.minutes as f64 / 60.0 + self.seconds as f64 / 3600.0;
        if negative { -d } else { d }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatHemisphere {
    N,
    S,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LonHemisphere {
    E,
    W,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmsField {
    LatDegrees,
    LatMinutes,
    LatSeconds,
    LonDegrees,
    LonMinutes,
    LonSeconds,
}

impl DmsField {

    pub fn from_str(s: &str) -> Option<DmsField> {
        use self::DmsField::*;
        match s.trim() {
            "lat-degrees" => Some(LatDegrees),
            "lat-minutes" => Some(LatMinutes),
            "lat-seconds" => Some(LatSeconds),
            "lon-degrees" => Some(LonDegrees),
            "lon-minutes" => Some(LonMinutes),
            "lon-seconds" => Some(LonSeconds),
            _ => None,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            DmsField::LatDegrees => MAX_LAT_DEGREES,
            DmsField::LonDegrees => MAX_LON_DEGREES,
            _ => MAX_MINUTES_SECONDS,
        }
    }
}

/// Colombia sits north of the equator and west of Greenwich.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmsInput {
    pub lat: DmsTriple,
    pub lon: DmsTriple,
    pub lat_hemisphere: LatHemisphere,
    pub lon_hemisphere: LonHemisphere,
}

impl Default for DmsInput {
    fn default() -> Self {
        DmsInput {
            lat: DmsTriple::default(),
            lon: DmsTriple::default(),
            lat_hemisphere: LatHemisphere::N,
            lon_hemisphere: LonHemisphere::W,
        }
    }
}

impl DmsInput {

    /// Stores the clamped value of `raw` and returns it.
    pub fn set_field(&mut self, field: DmsField, raw: &str) -> u32 {
        let v = parse_clamped(raw, field.max());
        let slot = match field {
            DmsField::LatDegrees => &mut self.lat.degrees,
            DmsField::LatMinutes => &mut self.lat.minutes,
            DmsField::LatSeconds => &mut self.lat.seconds,
            DmsField::LonDegrees => &mut self.lon.degrees,
            DmsField::LonMinutes => &mut self.lon.minutes,
            DmsField::LonSeconds => &mut self.lon.seconds,
        };
        *slot = v;
        v
    }

    pub fn latitude(&self) -> f64 {
        self.lat.to_decimal(self.lat_hemisphere == LatHemisphere::S)
    }

    pub fn longitude(&self) -> f64 {
        self.lon.to_decimal(self.lon_hemisphere == LonHemisphere::W)
    }

    /// [lng, lat]
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude(), self.latitude()]
    }

    pub fn set_hemisphere(&mut self, h: &str) -> Result<(), String> {
        match h.trim() {
            "N" | "n" => self.lat_hemisphere = LatHemisphere::N,
            "S" | "s" => self.lat_hemisphere = LatHemisphere::S,
            "E" | "e" => self.lon_hemisphere = LonHemisphere::E,
            "W" | "w" => self.lon_hemisphere = LonHemisphere::W,
            other => return Err(format!("unknown hemisphere {other:?}")),
        }
        Ok(())
    }
}

/// Integer prefix of `raw` (optional sign, then digits), 0 when there is
/// none, clamped into `[0, max]`.
pub fn parse_clamped(raw: &str, max: u32) -> u32 {
    let s = raw.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = digits
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    if digits.is_empty() || negative {
        return 0;
    }
    // overflow only happens above any valid range
    digits.parse::<u64>().map(|v| v.min(max as u64) as u32).unwrap_or(max)
}
