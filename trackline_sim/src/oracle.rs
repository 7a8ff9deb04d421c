//! Ground-truth fleet physics.
//!
//! The oracle owns the "real" world: a fleet of vehicles moving with
//! jittered headings and speeds on a seeded RNG. Each tick it emits one
//! true fix per vehicle; the feed then corrupts that stream before it
//! reaches the engine under test.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use trackline_core::model::{LicenseNumber, RawFix, Vehicle};
use trackline_core::registry::InMemoryRegistry;
use uuid::Uuid;

/// Spawn area: central Berlin.
const CENTER_LAT: f64 = 52.52;
const CENTER_LNG: f64 = 13.405;

/// Meters per degree of latitude.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

const FLEET_MODELS: &[(&str, &str)] = &[
    ("Toyota", "Corolla"),
    ("Ford", "Transit"),
    ("Tesla", "Model 3"),
    ("Mercedes", "Sprinter"),
    ("Volvo", "FH16"),
];

/// One simulated vehicle's true state.
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub vehicle: Vehicle,
    pub lat: f64,
    pub lng: f64,
    heading_rad: f64,
    speed_mps: f64,
}

impl SimVehicle {
    pub fn license(&self) -> &LicenseNumber {
        &self.vehicle.license
    }
}

/// Deterministic fleet motion model.
pub struct FleetOracle {
    rng: ChaCha8Rng,
    vehicles: Vec<SimVehicle>,
    time: f64,
    heading_jitter: Normal<f64>,
    speed_jitter: Normal<f64>,
}

impl FleetOracle {
    /// Creates a fleet of `fleet_size` vehicles scattered around the
    /// spawn area. `start_time` is unix seconds of tick zero.
    pub fn new(seed: u64, fleet_size: usize, start_time: f64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scatter = Normal::new(0.0, 0.05).expect("valid scatter distribution");
        let speed = Normal::new(13.0f64, 4.0).expect("valid speed distribution");

        let vehicles = (0..fleet_size)
            .map(|i| {
                let (brand, model) = FLEET_MODELS[i % FLEET_MODELS.len()];
                let license = LicenseNumber::new(format!("SIM-{:03}", i));
                SimVehicle {
                    vehicle: Vehicle {
                        id: Uuid::new_v4(),
                        license,
                        model: model.to_string(),
                        brand: brand.to_string(),
                    },
                    lat: CENTER_LAT + scatter.sample(&mut rng),
                    lng: CENTER_LNG + scatter.sample(&mut rng),
                    heading_rad: rng.gen_range(0.0..std::f64::consts::TAU),
                    speed_mps: speed.sample(&mut rng).clamp(0.0, 40.0),
                }
            })
            .collect();

        Self {
            rng,
            vehicles,
            time: start_time,
            heading_jitter: Normal::new(0.0, 0.15).expect("valid heading jitter"),
            speed_jitter: Normal::new(0.0, 0.5).expect("valid speed jitter"),
        }
    }

    /// Advances the world by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.time += dt;
        for v in &mut self.vehicles {
            v.heading_rad += self.heading_jitter.sample(&mut self.rng);
            v.speed_mps = (v.speed_mps + self.speed_jitter.sample(&mut self.rng)).clamp(0.0, 40.0);

            let dist = v.speed_mps * dt;
            let dlat = dist * v.heading_rad.cos() / METERS_PER_DEG_LAT;
            let dlng =
                dist * v.heading_rad.sin() / (METERS_PER_DEG_LAT * v.lat.to_radians().cos());
            v.lat = (v.lat + dlat).clamp(-89.0, 89.0);
            v.lng = (v.lng + dlng).clamp(-179.0, 179.0);
        }
    }

    /// Current simulation time in unix seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn fleet(&self) -> &[SimVehicle] {
        &self.vehicles
    }

    /// One true, device-stamped fix per vehicle at the current time.
    /// `filter` limits emission (e.g. to the still-reporting half of a
    /// silent fleet).
    pub fn true_fixes(&self, filter: impl Fn(usize) -> bool) -> Vec<RawFix> {
        self.vehicles
            .iter()
            .enumerate()
            .filter(|(i, _)| filter(*i))
            .map(|(_, v)| RawFix {
                license: v.vehicle.license.as_str().to_string(),
                lat: v.lat,
                lng: v.lng,
                timestamp: Some(self.time),
            })
            .collect()
    }

    /// Registers the whole fleet with the engine's registry collaborator.
    pub fn populate_registry(&self, registry: &InMemoryRegistry) {
        for v in &self.vehicles {
            registry.insert(v.vehicle.clone());
        }
    }
}
