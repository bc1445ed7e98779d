//! Real Kuala Lumpur locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap. The `NEAR_*` tables stay within
//! 2 km of Merdeka Square; the `CITY_*` tables span the wider city centre.

use delivery_planner::model::Coordinate;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

// ============================================================================
// Around Merdeka Square / Chinatown
// ============================================================================

pub const NEAR_RESTAURANTS: &[Location] = &[
    Location::new("Old China Cafe", 3.1422, 101.6951),
    Location::new("Merchant's Lane", 3.1437, 101.6972),
    Location::new("Masjid India Nasi Kandar", 3.1491, 101.6962),
];

pub const NEAR_HOMES: &[Location] = &[
    Location::new("Jalan Tun Perak Flat", 3.1465, 101.6958),
    Location::new("Jalan Sultan Apartment", 3.1439, 101.6989),
    Location::new("Kampung Attap Residence", 3.1370, 101.6935),
];

// ============================================================================
// Wider city: KLCC, Bukit Bintang, Bangsar, Mont Kiara, Brickfields
// ============================================================================

pub const CITY_RESTAURANTS: &[Location] = &[
    Location::new("Madam Kwan's KLCC", 3.1579, 101.7123),
    Location::new("Jalan Alor Hawker", 3.1456, 101.7086),
    Location::new("Bangsar Village Bistro", 3.1307, 101.6712),
    Location::new("Brickfields Banana Leaf", 3.1296, 101.6852),
    Location::new("Publika Food Court", 3.1713, 101.6655),
    Location::new("Kampung Baru Nasi Lemak", 3.1640, 101.7040),
    Location::new("Pavilion Food Republic", 3.1490, 101.7137),
    Location::new("Mid Valley Dim Sum", 3.1176, 101.6773),
];

pub const CITY_HOMES: &[Location] = &[
    Location::new("Titiwangsa Condo", 3.1790, 101.7060),
    Location::new("Setapak Terrace", 3.1910, 101.7150),
    Location::new("Bangsar South Tower", 3.1110, 101.6660),
    Location::new("Mont Kiara Residence", 3.1660, 101.6520),
    Location::new("Cheras Apartment", 3.1180, 101.7270),
    Location::new("Sentul Park Home", 3.1840, 101.6920),
    Location::new("Damansara Heights House", 3.1500, 101.6600),
    Location::new("Pudu Flat", 3.1350, 101.7130),
    Location::new("Ampang Hilir Villa", 3.1560, 101.7400),
    Location::new("Taman Desa Condo", 3.1020, 101.6850),
];
