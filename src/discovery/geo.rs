// src/discovery/geo.rs
//! Distance from the search origin. Locations resolve either as literal
//! "lat,lng" pairs or through a small gazetteer (built-ins + `[geo.places]`).

use std::collections::HashMap;

use crate::config::GeoConfig;
use crate::discovery::filters::state_code;
use crate::discovery::DiscoveredCompany;

const EARTH_RADIUS_MILES: f64 = 3958.8;

pub trait GeoDistance: Send + Sync {
    /// Miles between two free-form locations; `None` when either side fails to resolve.
    fn distance_between(&self, from: &str, to: &str) -> Option<f64>;
}

const BUILTIN_PLACES: &[(&str, f64, f64)] = &[
    ("austin, tx", 30.2672, -97.7431),
    ("dallas, tx", 32.7767, -96.7970),
    ("houston, tx", 29.7604, -95.3698),
    ("san antonio, tx", 29.4241, -98.4936),
    ("round rock, tx", 30.5083, -97.6789),
    ("new york, ny", 40.7128, -74.0060),
    ("boston, ma", 42.3601, -71.0589),
    ("cambridge, ma", 42.3736, -71.1097),
    ("chicago, il", 41.8781, -87.6298),
    ("san francisco, ca", 37.7749, -122.4194),
    ("san jose, ca", 37.3382, -121.8863),
    ("los angeles, ca", 34.0522, -118.2437),
    ("san diego, ca", 32.7157, -117.1611),
    ("seattle, wa", 47.6062, -122.3321),
    ("denver, co", 39.7392, -104.9903),
    ("atlanta, ga", 33.7490, -84.3880),
    ("miami, fl", 25.7617, -80.1918),
    ("phoenix, az", 33.4484, -112.0740),
    ("detroit, mi", 42.3314, -83.0458),
    ("ann arbor, mi", 42.2808, -83.7430),
    ("pittsburgh, pa", 40.4406, -79.9959),
    ("philadelphia, pa", 39.9526, -75.1652),
    ("minneapolis, mn", 44.9778, -93.2650),
    ("raleigh, nc", 35.7796, -78.6382),
    ("salt lake city, ut", 40.7608, -111.8910),
    ("portland, or", 45.5152, -122.6784),
    ("washington, dc", 38.9072, -77.0369),
];

pub fn haversine_miles(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// "30.27,-97.74" → (30.27, -97.74), range-checked.
pub fn parse_lat_lng(s: &str) -> Option<(f64, f64)> {
    let (lat, lng) = s.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)).then_some((lat, lng))
}

#[derive(Debug, Clone)]
pub struct HaversineGeo {
    places: HashMap<String, (f64, f64)>,
}

impl HaversineGeo {
    pub fn new(cfg: &GeoConfig) -> Self {
        let mut places: HashMap<String, (f64, f64)> = BUILTIN_PLACES
            .iter()
            .map(|(n, lat, lng)| (n.to_string(), (*lat, *lng)))
            .collect();
        for (name, [lat, lng]) in &cfg.places {
            places.insert(name.trim().to_lowercase(), (*lat, *lng));
        }
        Self { places }
    }

    pub fn resolve(&self, location: &str) -> Option<(f64, f64)> {
        if let Some(p) = parse_lat_lng(location) {
            return Some(p);
        }
        let key: String = location
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
            .to_lowercase();
        if let Some(p) = self.places.get(&key) {
            return Some(*p);
        }
        // "Austin, Texas, United States" → "austin, tx"
        let parts: Vec<&str> = key.split(", ").collect();
        if parts.len() < 2 {
            return None;
        }
        let state = state_code(parts[1]).map(str::to_lowercase)?;
        self.places.get(&format!("{}, {state}", parts[0])).copied()
    }
}

impl Default for HaversineGeo {
    fn default() -> Self {
        Self::new(&GeoConfig::default())
    }
}

impl GeoDistance for HaversineGeo {
    fn distance_between(&self, from: &str, to: &str) -> Option<f64> {
        Some(haversine_miles(self.resolve(from)?, self.resolve(to)?))
    }
}

/// Stamp distances, drop candidates beyond `radius`, sort nearest first.
/// Unresolvable locations are kept and placed after every resolved one.
/// Returns the kept list and how many were dropped.
pub fn apply_radius(
    companies: Vec<DiscoveredCompany>,
    origin: Option<&str>,
    radius: f64,
    geo: &dyn GeoDistance,
) -> (Vec<DiscoveredCompany>, usize) {
    let Some(origin) = origin else {
        return (companies, 0);
    };
    let total = companies.len();
    let mut known: Vec<DiscoveredCompany> = Vec::new();
    let mut unknown: Vec<DiscoveredCompany> = Vec::new();
    for mut c in companies {
        c.distance = c
            .location
            .as_deref()
            .and_then(|loc| geo.distance_between(origin, loc));
        match c.distance {
            Some(d) if d > radius => {}
            Some(_) => known.push(c),
            None => unknown.push(c),
        }
    }
    known.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::MAX)
            .total_cmp(&b.distance.unwrap_or(f64::MAX))
    });
    let kept = known.len() + unknown.len();
    known.extend(unknown);
    (known, total - kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(name: &str, loc: Option<&str>) -> DiscoveredCompany {
        let mut c = DiscoveredCompany::new(name, "test");
        c.location = loc.map(str::to_string);
        c
    }

    #[test]
    fn haversine_austin_dallas_is_about_182_miles() {
        let d = haversine_miles((30.2672, -97.7431), (32.7767, -96.7970));
        assert!((d - 182.0).abs() < 3.0, "got {d}");
    }

    #[test]
    fn resolves_coordinates_names_and_trailing_country() {
        let g = HaversineGeo::default();
        assert_eq!(g.resolve("30.5,-97.5"), Some((30.5, -97.5)));
        assert!(g.resolve("Austin,TX").is_some());
        assert!(g.resolve("Austin, TX, United States").is_some());
        assert_eq!(g.resolve("Austin, Texas, United States"), g.resolve("austin, tx"));
        assert!(g.resolve("Atlantis").is_none());
        assert!(parse_lat_lng("95,0").is_none());
    }

    #[test]
    fn configured_places_extend_the_gazetteer() {
        let mut cfg = GeoConfig::default();
        cfg.places.insert("college station, tx".into(), [30.6280, -96.3344]);
        let g = HaversineGeo::new(&cfg);
        assert!(g.distance_between("Austin, TX", "College Station, TX").is_some());
    }

    #[test]
    fn radius_filter_sorts_and_keeps_unknowns_last() {
        let g = HaversineGeo::default();
        let input = vec![
            at("Mystery", Some("Nowhere Special")),
            at("Dallas Co", Some("Dallas, TX")),
            at("Seattle Co", Some("Seattle, WA")),
            at("Round Rock Co", Some("Round Rock, TX")),
            at("No Location", None),
        ];
        let (kept, dropped) = apply_radius(input, Some("Austin, TX"), 250.0, &g);
        assert_eq!(dropped, 1);
        let names: Vec<&str> = kept.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Round Rock Co", "Dallas Co", "Mystery", "No Location"]);
        assert!(kept[2].distance.is_none());
    }

    #[test]
    fn no_origin_passes_everything_through() {
        let g = HaversineGeo::default();
        let (kept, dropped) = apply_radius(vec![at("A", Some("Seattle, WA"))], None, 1.0, &g);
        assert_eq!((kept.len(), dropped), (1, 0));
    }
}
