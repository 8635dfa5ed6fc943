use std::f64::consts::PI;

/// WGS84 / spherical-mercator earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Half the world width in EPSG:3857 meters (x and y both span ±this).
pub const HALF_WORLD_M: f64 = PI * EARTH_RADIUS_M;

/// Forward Web Mercator projection: lon/lat degrees to EPSG:3857 meters.
pub fn project(lon_deg: f64, lat_deg: f64) -> [f64; 2] {
    let x = EARTH_RADIUS_M * lon_deg.to_radians();
    let y = EARTH_RADIUS_M * (PI / 4.0 + lat_deg.to_radians() / 2.0).tan().ln();
    [x, y]
}

/// Inverse Web Mercator projection: EPSG:3857 meters to lon/lat degrees.
pub fn unproject(x: f64, y: f64) -> [f64; 2] {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
    [lon, lat]
}
