use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::utils::error::{ClassifyError, Result};

pub type ObjectId = String;

/// Names of the value sequences a light curve must expose.
pub mod fields {
    pub const JD: &str = "jd";
    pub const MAGPSF: &str = "magpsf";
    pub const SIGMAPSF: &str = "sigmapsf";
    pub const MAGZPSCI: &str = "magzpsci";
    pub const FID: &str = "fid";
    pub const RA: &str = "ra";
    pub const DEC: &str = "dec";

    pub const REQUIRED: [&str; 7] = [JD, MAGPSF, SIGMAPSF, MAGZPSCI, FID, RA, DEC];
}

/// A single photometric measurement as delivered by the alert stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub object_id: ObjectId,
    /// Julian Date
    pub jd: f64,
    pub magpsf: f64,
    pub sigmapsf: f64,
    pub magzpsci: f64,
    /// Band index (1 = g, 2 = r, 3 = i)
    pub fid: i64,
    pub ra: f64,
    pub dec: f64,
}

/// Prefix every classification service address must carry.
pub const TCP_SCHEME_PREFIX: &str = "tcp://";

/// A validated `tcp://<host>:<port>` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    raw: String,
    host: String,
    port: u16,
}

impl Address {
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = |reason: String| ClassifyError::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        if !address.starts_with(TCP_SCHEME_PREFIX) {
            return Err(invalid(format!(
                "expected the {} transport scheme",
                TCP_SCHEME_PREFIX
            )));
        }

        let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let port = url
            .port()
            .ok_or_else(|| invalid("missing port".to_string()))?;

        if !matches!(url.path(), "" | "/") || url.query().is_some() {
            return Err(invalid("unexpected path or query".to_string()));
        }

        Ok(Self {
            raw: address.to_string(),
            host: host.to_string(),
            port,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, ready for a socket connect.
    pub fn socket_target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Address {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

/// One row of a request: a single measurement after flux and time conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedObservation {
    pub mjd: f64,
    pub flux: f64,
    pub flux_err: f64,
    pub band: String,
    pub ra: f64,
    pub dec: f64,
    pub object_id: ObjectId,
    pub mwebv: f64,
}

/// Everything the remote classifier needs for one object.
///
/// Serialized as a 9-element tuple
/// `(mjd, flux, flux_err, band, ra, dec, object_id, redshift, mwebv)`; the service reads
/// it positionally, so the order must never change.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    pub mjd: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
    pub band: Vec<String>,
    pub ra: f64,
    pub dec: f64,
    pub object_id: ObjectId,
    pub redshift: Option<f64>,
    pub mwebv: f64,
}

impl ClassificationRequest {
    pub fn len(&self) -> usize {
        self.mjd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mjd.is_empty()
    }

    pub fn observations(&self) -> impl Iterator<Item = TransformedObservation> + '_ {
        (0..self.len()).map(move |i| TransformedObservation {
            mjd: self.mjd[i],
            flux: self.flux[i],
            flux_err: self.flux_err[i],
            band: self.band[i].clone(),
            ra: self.ra,
            dec: self.dec,
            object_id: self.object_id.clone(),
            mwebv: self.mwebv,
        })
    }
}

impl Serialize for ClassificationRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(9)?;
        tuple.serialize_element(&self.mjd)?;
        tuple.serialize_element(&self.flux)?;
        tuple.serialize_element(&self.flux_err)?;
        tuple.serialize_element(&self.band)?;
        tuple.serialize_element(&self.ra)?;
        tuple.serialize_element(&self.dec)?;
        tuple.serialize_element(&self.object_id)?;
        tuple.serialize_element(&self.redshift)?;
        tuple.serialize_element(&self.mwebv)?;
        tuple.end()
    }
}

/// Status flags handed back to the host pipeline instead of a result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Reserved for results that depend on other units; never produced here.
    MissingInfo,
    BadConfig,
    Error,
    Exception,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::MissingInfo => "MISSING_INFO",
            RunState::BadConfig => "BAD_CONFIG",
            RunState::Error => "ERROR",
            RunState::Exception => "EXCEPTION",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassificationResult {
    /// Whatever the service answered, untouched.
    Document(serde_json::Value),
    Status(RunState),
}

impl ClassificationResult {
    pub fn status(&self) -> Option<RunState> {
        match self {
            ClassificationResult::Status(state) => Some(*state),
            ClassificationResult::Document(_) => None,
        }
    }

    pub fn document(&self) -> Option<&serde_json::Value> {
        match self {
            ClassificationResult::Document(doc) => Some(doc),
            ClassificationResult::Status(_) => None,
        }
    }
}

/// Per-channel run parameters. Unknown keys are rejected so a typo surfaces as `BAD_CONFIG`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Overrides the band-index → band-name table.
    pub bands: Option<BTreeMap<i64, String>>,
}
