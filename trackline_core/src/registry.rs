//! Vehicle registry collaborator interface.
//!
//! The registry owns the Car records' CRUD lifecycle; the engine only
//! reads. The trait is injected (capability-scoped), never a process-wide
//! singleton, and lookups are cheap in-memory calls: the engine consults
//! it lazily and caches the result per index entry.

use crate::model::{LicenseNumber, Vehicle};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read-only lookup into the external vehicle registry.
pub trait VehicleRegistry: Send + Sync {
    /// Returns the registry's record for this license, if it knows one.
    fn get_vehicle(&self, license: &LicenseNumber) -> Option<Vehicle>;
}

/// In-memory registry used by tests and the simulation harness, and a
/// reasonable default when no external registry is wired up.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    vehicles: RwLock<HashMap<LicenseNumber, Vehicle>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vehicle: Vehicle) {
        self.vehicles
            .write()
            .unwrap()
            .insert(vehicle.license.clone(), vehicle);
    }
}

impl VehicleRegistry for InMemoryRegistry {
    fn get_vehicle(&self, license: &LicenseNumber) -> Option<Vehicle> {
        self.vehicles.read().unwrap().get(license).cloned()
    }
}
