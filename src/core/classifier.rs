use crate::adapters::dust_map::SfdGrid;
use crate::config::toml_config::ClassifierConfig;
use crate::core::backoff::Resilient;
use crate::core::connection_cache::ConnectionCache;
use crate::core::request::{build_request, BandTable};
use crate::domain::model::{ClassificationRequest, ClassificationResult, RunConfig, RunState};
use crate::domain::ports::{Classify, LightCurve, ReddeningMap, RpcConnection};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

/// Remote method invoked on the classification service.
pub const CLASSIFY_METHOD: &str = "classify";

/// Sends classification requests over a cached RPC connection.
#[derive(Debug, Clone)]
pub struct RpcClassifier {
    connection: Arc<dyn RpcConnection>,
}

impl RpcClassifier {
    pub fn new(connection: Arc<dyn RpcConnection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<dyn RpcConnection> {
        &self.connection
    }
}

#[async_trait]
impl Classify for RpcClassifier {
    async fn classify(&self, light_curves: &[ClassificationRequest]) -> Result<serde_json::Value> {
        // The service takes the whole list as its single positional argument.
        let params = serde_json::Value::Array(vec![serde_json::to_value(light_curves)?]);
        self.connection.call(CLASSIFY_METHOD, params).await
    }
}

/// Light-curve classification unit.
///
/// Converts a light curve to flux space, attaches the Galactic reddening at the object's
/// median position and submits it to the remote classifier, one object per call.
pub struct T2Classifier<C = Resilient<RpcClassifier>, M = SfdGrid> {
    classifier: C,
    dust_map: M,
    bands: BandTable,
}

impl T2Classifier {
    /// Build the unit from configuration.
    ///
    /// Validates `config`, loads the dust map and resolves the default service address
    /// through `cache`. Any failure is fatal: no unit is returned.
    pub fn new(config: &ClassifierConfig, cache: &ConnectionCache) -> Result<Self> {
        config.validate()?;
        let dust_map = SfdGrid::load(config.dust_map_path(), config.dust_map_scaling())?;
        let connection = cache.get_connection(config.default_address())?;
        let classifier = Resilient::new(RpcClassifier::new(connection), config.backoff_policy());

        tracing::info!(
            "Classifier ready: service {}, dust map {}",
            config.default_address(),
            config.dust_map_path()
        );

        Ok(Self::with_parts(classifier, dust_map, BandTable::default()))
    }
}

impl<C: Classify, M: ReddeningMap> T2Classifier<C, M> {
    pub fn with_parts(classifier: C, dust_map: M, bands: BandTable) -> Self {
        Self {
            classifier,
            dust_map,
            bands,
        }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn dust_map(&self) -> &M {
        &self.dust_map
    }

    /// Transform `light_curve` and submit it. The service's answer is returned untouched.
    pub async fn build_and_submit(&self, light_curve: &dyn LightCurve) -> Result<ClassificationResult> {
        self.submit(light_curve, &self.bands)
            .instrument(object_span(light_curve))
            .await
    }

    /// Host-pipeline entry point: never fails, reports problems as a [`RunState`].
    ///
    /// `run_config` is the channel's run parameters (`null` for defaults).
    pub async fn run(
        &self,
        light_curve: &dyn LightCurve,
        run_config: &serde_json::Value,
    ) -> ClassificationResult {
        self.run_with_status(light_curve, run_config)
            .instrument(object_span(light_curve))
            .await
    }

    async fn run_with_status(
        &self,
        light_curve: &dyn LightCurve,
        run_config: &serde_json::Value,
    ) -> ClassificationResult {
        let run_config = match parse_run_config(run_config) {
            Ok(run_config) => run_config,
            Err(e) => {
                tracing::error!("Invalid run config: {}", e);
                return ClassificationResult::Status(RunState::BadConfig);
            }
        };

        let bands = run_config
            .bands
            .map(BandTable::new)
            .unwrap_or_else(|| self.bands.clone());

        match self.submit(light_curve, &bands).await {
            Ok(result) => result,
            Err(e) => {
                let state = if e.is_data_error() {
                    RunState::Error
                } else {
                    RunState::Exception
                };
                tracing::error!(
                    category = ?e.category(),
                    "Classification failed ({}): {}",
                    state,
                    e
                );
                ClassificationResult::Status(state)
            }
        }
    }

    async fn submit(&self, light_curve: &dyn LightCurve, bands: &BandTable) -> Result<ClassificationResult> {
        let request = build_request(light_curve, bands, &self.dust_map)?;

        tracing::debug!(
            observations = request.len(),
            ra = request.ra,
            dec = request.dec,
            mwebv = request.mwebv,
            "Submitting light curve"
        );
        for row in request.observations() {
            tracing::trace!(
                mjd = row.mjd,
                flux = row.flux,
                flux_err = row.flux_err,
                band = %row.band,
                "Observation"
            );
        }

        let verdict = self.classifier.classify(std::slice::from_ref(&request)).await?;
        Ok(ClassificationResult::Document(verdict))
    }
}

/// Every log line about one light curve carries its object id.
fn object_span(light_curve: &dyn LightCurve) -> tracing::Span {
    tracing::info_span!("light_curve", object_id = light_curve.id())
}

fn parse_run_config(value: &serde_json::Value) -> Result<RunConfig> {
    if value.is_null() {
        return Ok(RunConfig::default());
    }
    Ok(serde_json::from_value(value.clone())?)
}
