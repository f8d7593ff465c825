//! Rigid circle physics: integration, pairwise collision response, world bounds

use std::collections::BTreeMap;

pub use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Fraction of the remaining penetration removed by positional correction each step
const CORRECTION_PERCENT: f32 = 0.2;
/// Separating velocity (per unit of penetration) added to every contact impulse
const PENETRATION_BIAS: f32 = 2.0;
/// Below this center distance two bodies are treated as coincident
const COINCIDENT_EPSILON: f32 = 1e-4;

pub const DEFAULT_DAMPING: f32 = 0.95;
pub const DEFAULT_RESTITUTION: f32 = 0.5;

/// Key of a body inside one [`PhysicsEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(pub u64);

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A simulated circle
#[derive(Debug, Clone, Copy)]
pub struct Body {
    /// Assigned by the engine on insertion
    pub id: BodyId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Accumulated force, cleared after every integration step
    pub force: Vec2,
    pub radius: f32,
    inverse_mass: f32,
    /// Per-step velocity multiplier (0 = full stop, 1 = no damping)
    pub damping: f32,
    /// Bounciness (0 = no bounce, 1 = perfect bounce)
    pub restitution: f32,
    /// Static bodies are never integrated but still block others
    pub is_static: bool,
}

impl Body {
    pub fn new(position: Vec2, radius: f32, mass: f32) -> Self {
        let mass = if mass > 0.0 { mass } else { 1.0 };
        Self {
            id: BodyId(0),
            position,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            radius: radius.max(f32::EPSILON),
            inverse_mass: 1.0 / mass,
            damping: DEFAULT_DAMPING,
            restitution: DEFAULT_RESTITUTION,
            is_static: false,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    #[cfg(test)]
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    #[cfg(test)]
    pub fn fixed(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Inverse mass as seen by the solver; static bodies behave as infinitely heavy
    pub fn inverse_mass(&self) -> f32 {
        if self.is_static {
            0.0
        } else {
            self.inverse_mass
        }
    }

    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Instantaneous change in momentum
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.velocity += impulse * self.inverse_mass();
    }

    pub fn overlaps(&self, other: &Body) -> bool {
        self.position.distance(other.position) < self.radius + other.radius
    }

    fn integrate(&mut self, dt: f32) {
        if self.is_static {
            return;
        }
        let acceleration = self.force * self.inverse_mass;
        self.velocity += acceleration * dt;
        self.velocity *= self.damping;
        self.position += self.velocity * dt;
        self.force = Vec2::ZERO;
    }
}

/// An overlapping pair found during collision detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: BodyId,
    pub b: BodyId,
    pub distance: f32,
    pub penetration: f32,
}

/// Owns every body of one game instance and steps them together
#[derive(Debug)]
pub struct PhysicsEngine {
    bodies: BTreeMap<BodyId, Body>,
    width: f32,
    height: f32,
    next_id: u64,
}

impl PhysicsEngine {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bodies: BTreeMap::new(),
            width,
            height,
            next_id: 1,
        }
    }

    /// World size as (width, height)
    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Insert a body and return the id it was registered under
    pub fn add_body(&mut self, mut body: Body) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        body.id = id;
        self.bodies.insert(id, body);
        id
    }

    /// Remove a body; unknown ids are ignored
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        self.bodies.remove(&id)
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Advance every body by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 || self.bodies.is_empty() {
            return;
        }

        for body in self.bodies.values_mut() {
            body.integrate(dt);
        }

        self.resolve_collisions();

        let (width, height) = (self.width, self.height);
        for body in self.bodies.values_mut() {
            constrain_to_world(body, width, height);
        }
    }

    /// Exhaustive pairwise overlap test in ascending id order
    pub fn detect_collisions(&self) -> Vec<Contact> {
        let bodies: Vec<&Body> = self.bodies.values().collect();
        let mut contacts = Vec::new();

        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                if let Some(contact) = contact_between(bodies[i], bodies[j]) {
                    contacts.push(contact);
                }
            }
        }

        contacts
    }

    /// One impulse + positional correction pass over the pairs found overlapping
    /// at the start of the pass. Returns how many pairs received a response.
    pub fn resolve_collisions(&mut self) -> usize {
        let mut resolved = 0;

        for contact in self.detect_collisions() {
            let (Some(mut a), Some(mut b)) =
                (self.bodies.get(&contact.a).copied(), self.bodies.get(&contact.b).copied())
            else {
                continue;
            };

            // Earlier pairs in this pass may already have moved either body
            if resolve_pair(&mut a, &mut b) {
                self.bodies.insert(a.id, a);
                self.bodies.insert(b.id, b);
                resolved += 1;
            }
        }

        resolved
    }
}

fn contact_between(a: &Body, b: &Body) -> Option<Contact> {
    let distance = a.position.distance(b.position);
    let min_distance = a.radius + b.radius;
    (distance < min_distance).then_some(Contact {
        a: a.id,
        b: b.id,
        distance,
        penetration: min_distance - distance,
    })
}

/// Impulse plus positional correction for one pair; returns false when the pair needs no response.
/// Separating pairs skip the impulse but are still pushed out of overlap.
fn resolve_pair(a: &mut Body, b: &mut Body) -> bool {
    let Some(contact) = contact_between(a, b) else {
        return false;
    };
    let inverse_mass_sum = a.inverse_mass() + b.inverse_mass();
    if inverse_mass_sum <= 0.0 {
        return false;
    }

    let normal = if contact.distance < COINCIDENT_EPSILON {
        Vec2::new(1.0, 0.0)
    } else {
        (b.position - a.position) * (1.0 / contact.distance)
    };

    let velocity_along_normal = (b.velocity - a.velocity).dot(normal);
    if velocity_along_normal <= 0.0 {
        let restitution = a.restitution.min(b.restitution);
        let j = (-(1.0 + restitution) * velocity_along_normal
            + PENETRATION_BIAS * contact.penetration)
            / inverse_mass_sum;
        let impulse = normal * j;

        a.apply_impulse(-impulse);
        b.apply_impulse(impulse);
    }

    let correction = normal * (contact.penetration / inverse_mass_sum * CORRECTION_PERCENT);
    a.position -= correction * a.inverse_mass();
    b.position += correction * b.inverse_mass();

    true
}

/// Clamp a body inside `[r, w-r] x [r, h-r]`, bouncing the crossed velocity component back inward.
/// Static bodies are clamped without bouncing.
fn constrain_to_world(body: &mut Body, width: f32, height: f32) {
    let r = body.radius;
    let bounce = if body.is_static { 0.0 } else { body.restitution };

    if body.position.x < r {
        body.position.x = r;
        body.velocity.x = body.velocity.x.abs() * bounce;
    } else if body.position.x > width - r {
        body.position.x = width - r;
        body.velocity.x = -body.velocity.x.abs() * bounce;
    }

    if body.position.y < r {
        body.position.y = r;
        body.velocity.y = body.velocity.y.abs() * bounce;
    } else if body.position.y > height - r {
        body.position.y = height - r;
        body.velocity.y = -body.velocity.y.abs() * bounce;
    }
}
