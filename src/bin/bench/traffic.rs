// Poisson Traffic Generator: seedable message workload
// Random standard-node pairs, Poisson-distributed arrivals per tick

use cluster_mesh_engine::{ClusterId, MessageRequest, NetworkSimulation};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// A standard node that can send or receive, addressed the way sends are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub cluster: ClusterId,
    pub name: String,
}

/// Standard nodes alive right now. Failures shrink this set mid-run.
pub fn live_endpoints(sim: &NetworkSimulation) -> Vec<Endpoint> {
    sim.topology()
        .nodes()
        .filter(|n| !n.is_gateway())
        .map(|n| Endpoint { cluster: n.cluster, name: n.name.clone() })
        .collect()
}

pub struct TrafficGenerator {
    rng: ChaCha8Rng,
    pub spawn_count: u32,
}

impl TrafficGenerator {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng, spawn_count: 0 }
    }

    /// Poisson(`lambda`) messages between distinct endpoints.
    pub fn generate_tick(&mut self, endpoints: &[Endpoint], lambda: f64) -> Vec<MessageRequest> {
        if endpoints.len() < 2 || lambda <= 0.0 {
            return Vec::new();
        }

        let n_messages = poisson_sample(&mut self.rng, lambda);
        let mut sends = Vec::with_capacity(n_messages as usize);
        for _ in 0..n_messages {
            let src = self.rng.gen_range(0..endpoints.len());
            // Shift past the source so the pair is always distinct
            let dst = (src + self.rng.gen_range(1..endpoints.len())) % endpoints.len();
            let (from, to) = (&endpoints[src], &endpoints[dst]);
            self.spawn_count += 1;
            sends.push(MessageRequest::new(
                from.cluster,
                &from.name,
                to.cluster,
                &to.name,
                &format!("bench-{}", self.spawn_count),
            ));
        }
        sends
    }
}

/// Poisson sampling via Knuth algorithm.
/// For λ < 30, uses direct method. For larger λ, uses normal approximation.
fn poisson_sample(rng: &mut ChaCha8Rng, lambda: f64) -> u32 {
    if lambda < 30.0 {
        let l = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;
        loop {
            k += 1;
            p *= rng.gen::<f64>();
            if p <= l {
                return k - 1;
            }
        }
    } else {
        let u1: f64 = rng.gen();
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let result = lambda + lambda.sqrt() * z;
        result.round().max(0.0) as u32
    }
}
