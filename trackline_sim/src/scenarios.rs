//! Stress scenarios for the track engine.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScenarioId {
    /// Clean fleet with mild feed noise
    SteadyState,

    /// 80% of fixes arrive at least twice
    DuplicateFlood,

    /// Heavy reordering and clock skew, some beyond the reorder window
    TimeWarp,

    /// Half the fleet stops reporting mid-run and must be evicted
    SilentFleet,

    /// 10x fleet against tight buffer bounds
    RushHour,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SteadyState,
            ScenarioId::DuplicateFlood,
            ScenarioId::TimeWarp,
            ScenarioId::SilentFleet,
            ScenarioId::RushHour,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SteadyState => "steady_state",
            ScenarioId::DuplicateFlood => "duplicate_flood",
            ScenarioId::TimeWarp => "time_warp",
            ScenarioId::SilentFleet => "silent_fleet",
            ScenarioId::RushHour => "rush_hour",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SteadyState => "Baseline fleet with mild duplication and reordering",
            ScenarioId::DuplicateFlood => "Duplicate storm: most fixes arrive more than once",
            ScenarioId::TimeWarp => "Late and skewed fixes, some beyond the reorder window",
            ScenarioId::SilentFleet => "Half the fleet falls silent and must age out",
            ScenarioId::RushHour => "Large fleet against tight per-vehicle buffer bounds",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady_state" | "steadystate" => Ok(ScenarioId::SteadyState),
            "duplicate_flood" | "duplicateflood" => Ok(ScenarioId::DuplicateFlood),
            "time_warp" | "timewarp" => Ok(ScenarioId::TimeWarp),
            "silent_fleet" | "silentfleet" => Ok(ScenarioId::SilentFleet),
            "rush_hour" | "rushhour" => Ok(ScenarioId::RushHour),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, scenario);
        }
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!("chaos_storm".parse::<ScenarioId>().is_err());
    }
}
