//! Procedural city generation and collision-constrained movement.
//!
//! Generation fills a [`SolidRegistry`] with axis-aligned volumes (roads, buildings,
//! rooftop connectors, street furniture); every agent then moves by querying that same
//! registry. [`CitySim`] ties the two together behind a fixed-rate `tick`.

pub mod building;
pub mod city;
pub mod config;
pub mod locomotion;
pub mod movement;
pub mod npc;
pub mod physics;
pub mod player;
pub mod roads;
pub mod rooftops;
pub mod sim;
pub mod spatial;
pub mod structures;
pub mod teleport;
pub mod traffic;
pub mod vehicle;
pub mod volume;

pub use building::{Building, BuildingKind};
pub use city::{generate_city, CityLayout, StructureKind};
pub use config::{load_city_config_from_file, CityConfig};
pub use npc::PatrolBot;
pub use player::{Avatar, AvatarIntent, HudSignals, LocomotionState};
pub use roads::{RoadAxis, RoadClass, RoadSegment};
pub use sim::{tick_duration, AgentPose, CitySim, CitySnapshot, FIXED_TIMESTEP_HZ};
pub use spatial::{SolidRegistry, VolumeId};
pub use traffic::{SignalPhase, TrafficSignal};
pub use vehicle::{Vehicle, VehicleFleet};
pub use volume::{Volume, VolumeCategory, VolumeTraits};
