use log::debug;
use rand::RngCore;

use crate::assignment::Assignment;
use crate::config::EngineConfig;
use crate::engine::{InferenceEngine, RecursiveConditioning, SimpleConditioning, VariableElimination};
use crate::error::Result;
use crate::evidence::Evidence;
use crate::factor::Factor;
use crate::network::Network;
use crate::types::VarId;

/// Dispatches every query to the engine best suited for it.
///
/// | Query | Engine |
/// |-------|--------|
/// | posterior, no evidence | [`SimpleConditioning`] |
/// | posterior, with evidence | [`RecursiveConditioning`] |
/// | `Pr(e)`, posterior factors | [`VariableElimination`] |
/// | sampling, no evidence | [`SimpleConditioning`] |
/// | sampling, with evidence | [`RecursiveConditioning`] |
///
/// Sub-engines are created on first use. Before delegating, the chosen
/// engine's evidence is replaced by this engine's evidence if they differ.
#[derive(Debug)]
pub struct BestEngine<'a> {
    network: &'a Network,
    evidence: Evidence,
    config: EngineConfig,
    simple: Option<SimpleConditioning<'a>>,
    elimination: Option<VariableElimination<'a>>,
    recursive: Option<RecursiveConditioning<'a>>,
}

fn synced<'e, E: InferenceEngine>(engine: &'e mut E, evidence: &Evidence) -> &'e mut E {
    if engine.evidence() != evidence.values() {
        engine.evidence_state_mut().replace(evidence.values().clone());
    }
    engine
}

impl<'a> BestEngine<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_config(network, &EngineConfig::default())
    }

    pub fn with_config(network: &'a Network, config: &EngineConfig) -> Self {
        Self {
            network,
            evidence: Evidence::new(),
            config: config.clone(),
            simple: None,
            elimination: None,
            recursive: None,
        }
    }

    fn simple(&mut self) -> &mut SimpleConditioning<'a> {
        let engine = self
            .simple
            .get_or_insert_with(|| SimpleConditioning::with_config(self.network, &self.config));
        synced(engine, &self.evidence)
    }

    fn elimination(&mut self) -> &mut VariableElimination<'a> {
        let engine = self
            .elimination
            .get_or_insert_with(|| VariableElimination::with_config(self.network, &self.config));
        synced(engine, &self.evidence)
    }

    fn recursive(&mut self) -> &mut RecursiveConditioning<'a> {
        let engine = self
            .recursive
            .get_or_insert_with(|| RecursiveConditioning::with_config(self.network, &self.config));
        synced(engine, &self.evidence)
    }

    /// The posterior `P(vars | e)` as a normalized factor.
    pub fn posterior(&mut self, vars: &[VarId]) -> Result<Factor> {
        self.elimination().posterior(vars)
    }
}

impl InferenceEngine for BestEngine<'_> {
    fn network(&self) -> &Network {
        self.network
    }

    fn evidence_state(&self) -> &Evidence {
        &self.evidence
    }

    fn evidence_state_mut(&mut self) -> &mut Evidence {
        &mut self.evidence
    }

    fn probability(&mut self, var: VarId, value: usize) -> Result<f64> {
        if self.evidence.values().is_empty() {
            debug!("BestEngine: probability({}, {}) -> simple conditioning", var, value);
            self.simple().probability(var, value)
        } else {
            debug!("BestEngine: probability({}, {}) -> recursive conditioning", var, value);
            self.recursive().probability(var, value)
        }
    }

    fn distribution(&mut self, var: VarId) -> Result<Vec<f64>> {
        if self.evidence.values().is_empty() {
            self.simple().distribution(var)
        } else {
            self.recursive().distribution(var)
        }
    }

    fn evidence_probability(&mut self) -> Result<f64> {
        self.elimination().evidence_probability()
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> Result<Assignment> {
        if self.evidence.values().is_empty() {
            self.simple().sample(rng)
        } else {
            self.recursive().sample(rng)
        }
    }
}
