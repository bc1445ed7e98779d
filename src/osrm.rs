//! OSRM HTTP adapter for road-distance matrices.

use serde::Deserialize;

use crate::error::MatrixError;
use crate::matrix::DistanceMatrix;
use crate::model::Coordinate;
use crate::traits::DistanceMatrixProvider;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Blocking client; call it from a worker thread, never from an async task.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[Coordinate]) -> String {
        let coords = locations
            .iter()
            .map(|location| format!("{:.6},{:.6}", location.lng, location.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<DistanceMatrix, MatrixError> {
        if locations.is_empty() {
            return DistanceMatrix::from_flat(0, Vec::new());
        }

        let body = self
            .client
            .get(self.table_url(locations))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())
            .map_err(|err| MatrixError::Provider(err.to_string()))?;

        body.into_matrix(locations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    /// Meters; `null` where OSRM found no route.
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_matrix(self, expected: usize) -> Result<DistanceMatrix, MatrixError> {
        if self.code != "Ok" {
            return Err(MatrixError::Provider(format!(
                "OSRM returned {}: {}",
                self.code,
                self.message.unwrap_or_default()
            )));
        }

        let rows = self
            .distances
            .ok_or_else(|| MatrixError::Provider("OSRM response has no distances".to_string()))?;
        if rows.len() != expected {
            return Err(MatrixError::DimensionMismatch {
                expected,
                actual: rows.len(),
            });
        }

        let mut km_rows = Vec::with_capacity(rows.len());
        for (row, entries) in rows.into_iter().enumerate() {
            let mut km = Vec::with_capacity(entries.len());
            for (col, meters) in entries.into_iter().enumerate() {
                match meters {
                    Some(_) if row == col => km.push(0.0),
                    Some(meters) => km.push(meters / 1000.0),
                    None => return Err(MatrixError::Unroutable { row, col }),
                }
            }
            km_rows.push(km);
        }

        DistanceMatrix::from_rows(km_rows)
    }
}
