//! Shared network fixtures for the integration tests.

#![allow(dead_code)]

use bn_rs::network::Network;
use bn_rs::types::VarId;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// rain -> sprinkler, {sprinkler, rain} -> grass_wet
///
/// Grass is never wet when neither the sprinkler nor the rain is on.
pub fn sprinkler() -> Network {
    let mut net = Network::new("sprinkler");
    let rain = net.add_variable("rain", ["true", "false"]).unwrap();
    let sprinkler = net.add_variable("sprinkler", ["true", "false"]).unwrap();
    let grass = net.add_variable("grass_wet", ["true", "false"]).unwrap();
    net.add_parent(sprinkler, rain).unwrap();
    net.add_parent(grass, sprinkler).unwrap();
    net.add_parent(grass, rain).unwrap();
    net.set_probabilities(rain, &[0.2, 0.8]).unwrap();
    net.set_probabilities(sprinkler, &[0.01, 0.99, 0.4, 0.6]).unwrap();
    net.set_probabilities(grass, &[0.99, 0.01, 0.9, 0.1, 0.8, 0.2, 0.0, 1.0])
        .unwrap();
    net
}

/// gender -> age
pub fn gender_age() -> Network {
    let mut net = Network::new("population");
    let gender = net.add_variable("gender", ["male", "female"]).unwrap();
    let age = net.add_variable("age", ["<15", ">=15"]).unwrap();
    net.add_parent(age, gender).unwrap();
    net.set_probabilities(gender, &[0.55, 0.45]).unwrap();
    net.set_probabilities(age, &[0.55, 0.45, 0.50, 0.50]).unwrap();
    net
}

/// The classic "Asia" chest clinic network (Lauritzen & Spiegelhalter).
pub fn asia() -> Network {
    let yn = ["yes", "no"];
    let mut net = Network::new("asia");
    let asia = net.add_variable("asia", yn).unwrap();
    let smoke = net.add_variable("smoke", yn).unwrap();
    let tub = net.add_variable("tub", yn).unwrap();
    let lung = net.add_variable("lung", yn).unwrap();
    let bronc = net.add_variable("bronc", yn).unwrap();
    let either = net.add_variable("either", yn).unwrap();
    let xray = net.add_variable("xray", yn).unwrap();
    let dysp = net.add_variable("dysp", yn).unwrap();

    net.add_parent(tub, asia).unwrap();
    net.add_parent(lung, smoke).unwrap();
    net.add_parent(bronc, smoke).unwrap();
    net.add_parent(either, lung).unwrap();
    net.add_parent(either, tub).unwrap();
    net.add_parent(xray, either).unwrap();
    net.add_parent(dysp, bronc).unwrap();
    net.add_parent(dysp, either).unwrap();

    net.set_probabilities(asia, &[0.01, 0.99]).unwrap();
    net.set_probabilities(smoke, &[0.5, 0.5]).unwrap();
    net.set_probabilities(tub, &[0.05, 0.95, 0.01, 0.99]).unwrap();
    net.set_probabilities(lung, &[0.1, 0.9, 0.01, 0.99]).unwrap();
    net.set_probabilities(bronc, &[0.6, 0.4, 0.3, 0.7]).unwrap();
    // Logical OR of lung and tub.
    net.set_probabilities(either, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0])
        .unwrap();
    net.set_probabilities(xray, &[0.98, 0.02, 0.05, 0.95]).unwrap();
    net.set_probabilities(dysp, &[0.9, 0.1, 0.8, 0.2, 0.7, 0.3, 0.1, 0.9])
        .unwrap();
    net
}

/// A random layered network: every variable below the first layer gets up to
/// `max_parents` parents from the layer directly above it.
pub fn layered(seed: u64, layers: usize, width: usize, max_parents: usize) -> Network {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut net = Network::new(format!("layered-{}", seed));
    let mut previous: Vec<VarId> = Vec::new();

    for layer in 0..layers {
        let mut current = Vec::with_capacity(width);
        for i in 0..width {
            let card = rng.gen_range(2..=3);
            let domain: Vec<String> = (0..card).map(|v| format!("s{}", v)).collect();
            let var = net.add_variable(format!("x{}_{}", layer, i), domain).unwrap();
            if !previous.is_empty() {
                let k = rng.gen_range(1..=max_parents.min(previous.len()));
                for &p in previous.choose_multiple(&mut rng, k) {
                    net.add_parent(var, p).unwrap();
                }
            }
            current.push(var);
        }
        previous = current;
    }

    for var in net.ids().collect::<Vec<_>>() {
        let card = net.cardinality(var);
        let rows = net.variable(var).row_count();
        let mut table = Vec::with_capacity(rows * card);
        for _ in 0..rows {
            let row: Vec<f64> = (0..card).map(|_| rng.gen_range(0.05..1.0)).collect();
            let total: f64 = row.iter().sum();
            table.extend(row.iter().map(|p| p / total));
        }
        net.set_probabilities(var, &table).unwrap();
    }
    net
}

pub fn id(net: &Network, name: &str) -> VarId {
    net.id(name).unwrap()
}
