//! City-sized demo plans.
//!
//! Three presets with random homes, visits, demands and capacities inside a
//! bounding box, generated from a fixed seed. All visits start unassigned.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use technician_routing::domain::{Location, RoutePlan, Technician, Visit};

const FIRST_NAMES: [&str; 10] = ["Amy", "Beth", "Chad", "Dan", "Elsa", "Flo", "Gus", "Hugo", "Ivy", "Jay"];
const LAST_NAMES: [&str; 10] = ["Cole", "Fox", "Green", "Jones", "King", "Li", "Poe", "Rye", "Smith", "Watt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Sydney,
    Melbourne,
    Brisbane,
}

/// Parameters of a generated plan. Ranges are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoDataProperties {
    pub seed: u64,
    pub visit_count: usize,
    pub technician_count: usize,
    pub min_demand: i64,
    pub max_demand: i64,
    pub min_technician_capacity: i64,
    pub max_technician_capacity: i64,
    pub south_west_corner: Location,
    pub north_east_corner: Location,
}

impl DemoData {
    pub const ALL: [DemoData; 3] = [DemoData::Sydney, DemoData::Melbourne, DemoData::Brisbane];

    pub fn name(self) -> &'static str {
        match self {
            DemoData::Sydney => "SYDNEY",
            DemoData::Melbourne => "MELBOURNE",
            DemoData::Brisbane => "BRISBANE",
        }
    }

    pub fn properties(self) -> DemoDataProperties {
        match self {
            DemoData::Sydney => DemoDataProperties {
                seed: 3,
                visit_count: 85,
                technician_count: 7,
                min_demand: 1,
                max_demand: 3,
                min_technician_capacity: 25,
                max_technician_capacity: 50,
                south_west_corner: Location::new(-33.868820, 151.209296),
                north_east_corner: Location::new(-33.700001, 151.300003),
            },
            DemoData::Melbourne => DemoDataProperties {
                seed: 4,
                visit_count: 78,
                technician_count: 8,
                min_demand: 2,
                max_demand: 4,
                min_technician_capacity: 30,
                max_technician_capacity: 60,
                south_west_corner: Location::new(-37.813629, 144.963058),
                north_east_corner: Location::new(-37.500000, 145.000000),
            },
            DemoData::Brisbane => DemoDataProperties {
                seed: 5,
                visit_count: 70,
                technician_count: 5,
                min_demand: 1,
                max_demand: 2,
                min_technician_capacity: 20,
                max_technician_capacity: 40,
                south_west_corner: Location::new(-27.469770, 153.025124),
                north_east_corner: Location::new(-27.200000, 153.100006),
            },
        }
    }

    pub fn generate(self) -> RoutePlan {
        build_plan(self.name().to_lowercase(), &self.properties())
    }
}

/// Same properties give the same plan.
pub fn build_plan(name: impl Into<String>, properties: &DemoDataProperties) -> RoutePlan {
    let mut rng = ChaCha8Rng::seed_from_u64(properties.seed);
    let sw = properties.south_west_corner;
    let ne = properties.north_east_corner;
    let location = |rng: &mut ChaCha8Rng| {
        Location::new(
            rng.random_range(sw.latitude..ne.latitude),
            rng.random_range(sw.longitude..ne.longitude),
        )
    };

    let technicians = (0..properties.technician_count)
        .map(|i| {
            let capacity = rng.random_range(properties.min_technician_capacity..=properties.max_technician_capacity);
            Technician::new(i.to_string(), capacity, location(&mut rng))
        })
        .collect();

    let visits = (0..properties.visit_count)
        .map(|i| {
            let visit_name = format!(
                "{} {}",
                FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())],
                LAST_NAMES[rng.random_range(0..LAST_NAMES.len())]
            );
            let demand = rng.random_range(properties.min_demand..=properties.max_demand);
            Visit::new(i.to_string(), visit_name, location(&mut rng), demand)
        })
        .collect();

    RoutePlan::new(name, sw, ne, technicians, visits)
}
