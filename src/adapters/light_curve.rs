use crate::domain::model::{fields, ObjectId, Observation};
use crate::domain::ports::LightCurve;
use crate::utils::error::{ClassifyError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// A light curve held as named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryLightCurve {
    id: ObjectId,
    columns: HashMap<String, Vec<f64>>,
}

impl InMemoryLightCurve {
    pub fn new(id: impl Into<ObjectId>) -> Self {
        Self {
            id: id.into(),
            columns: HashMap::new(),
        }
    }

    pub fn with_values(mut self, field: &str, values: Vec<f64>) -> Self {
        self.columns.insert(field.to_string(), values);
        self
    }

    pub fn from_observations(id: impl Into<ObjectId>, observations: &[Observation]) -> Self {
        let column = |f: fn(&Observation) -> f64| observations.iter().map(f).collect::<Vec<_>>();

        Self::new(id)
            .with_values(fields::JD, column(|o| o.jd))
            .with_values(fields::MAGPSF, column(|o| o.magpsf))
            .with_values(fields::SIGMAPSF, column(|o| o.sigmapsf))
            .with_values(fields::MAGZPSCI, column(|o| o.magzpsci))
            .with_values(fields::FID, column(|o| o.fid as f64))
            .with_values(fields::RA, column(|o| o.ra))
            .with_values(fields::DEC, column(|o| o.dec))
    }
}

impl LightCurve for InMemoryLightCurve {
    fn id(&self) -> &str {
        &self.id
    }

    fn values(&self, field: &str) -> Option<&[f64]> {
        self.columns.get(field).map(Vec::as_slice)
    }
}

/// Read observations and group them into one light curve per object, in order of first
/// appearance. The header must name every [`Observation`] field.
pub fn read_light_curves<R: Read>(reader: R) -> Result<Vec<InMemoryLightCurve>> {
    let mut order: Vec<ObjectId> = Vec::new();
    let mut grouped: HashMap<ObjectId, Vec<Observation>> = HashMap::new();

    let mut csv_reader = csv::Reader::from_reader(reader);
    for record in csv_reader.deserialize::<Observation>() {
        let observation = record.map_err(|e| match e.position() {
            Some(position) => ClassifyError::InvalidRecord {
                line: position.line(),
                message: e.to_string(),
            },
            None => ClassifyError::CsvError(e),
        })?;

        grouped
            .entry(observation.object_id.clone())
            .or_insert_with(|| {
                order.push(observation.object_id.clone());
                Vec::new()
            })
            .push(observation);
    }

    tracing::debug!("Read {} light curves", order.len());

    Ok(order
        .into_iter()
        .map(|id| {
            let observations = grouped.remove(&id).unwrap_or_default();
            InMemoryLightCurve::from_observations(id, &observations)
        })
        .collect())
}

pub fn read_light_curves_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<InMemoryLightCurve>> {
    let file = std::fs::File::open(path)?;
    read_light_curves(file)
}
