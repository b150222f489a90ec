//! Kinematic motion of simulated objects in a discrete-event world.
//!
//! Objects translate along tracks with three-phase speed profiles, rotate
//! about their own axes, and can ride on other objects. Timing is driven
//! by a host implementing [`host::Host`]; [`sim::Simulation`] is a small
//! reference host.

pub mod events;
pub mod geometry;
pub mod host;
pub mod kinematics;
pub mod layout;
pub mod object;
pub mod profile;
pub mod scheduler;
pub mod sim;
pub mod state;
pub mod track;
pub mod world;
