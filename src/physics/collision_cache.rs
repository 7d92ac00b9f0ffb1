//! Contact manifold persistence across simulation steps.

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::debug;

use super::contact::{CollisionData, Contact};
use super::find_body;
use super::rigid_body::{BodyId, RigidBody};

/// Squared distance under which a fourth manifold point counts as lying in
/// the triangle of the first three.
const MANIFOLD_AREA_EPSILON: f32 = 1e-8;

/// Unordered body pair, stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdPair {
    pub first: BodyId,
    pub second: BodyId,
}

impl IdPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    #[inline]
    pub fn contains(&self, id: BodyId) -> bool {
        self.first == id || self.second == id
    }
}

/// Contact manifolds keyed by body pair.
///
/// Every stored manifold has `body_a == key.first`, and holds between one
/// and `max_contacts` contacts.
#[derive(Debug, Clone)]
pub struct CollisionCache {
    collisions: BTreeMap<IdPair, CollisionData>,
    max_contacts: usize,
    persistence_threshold: f32,
}

impl CollisionCache {
    pub fn new(max_contacts: usize, persistence_threshold: f32) -> Self {
        Self {
            collisions: BTreeMap::new(),
            max_contacts,
            persistence_threshold,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.collisions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty()
    }

    pub fn get(&self, a: BodyId, b: BodyId) -> Option<&CollisionData> {
        self.collisions.get(&IdPair::new(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollisionData> {
        self.collisions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CollisionData> {
        self.collisions.values_mut()
    }

    pub fn clear(&mut self) {
        self.collisions.clear();
    }

    /// Re-project cached contacts through the bodies' current poses and drop
    /// the ones that no longer describe the same contact.
    ///
    /// A contact survives if both anchors moved less than the persistence
    /// threshold from where the contact was detected, the two points have not slid apart
    /// tangentially by more than the threshold, and the bodies still overlap
    /// along the normal. Manifolds left without contacts are removed.
    pub fn refresh_contacts(&mut self, bodies: &[RigidBody]) {
        let threshold_sq = self.persistence_threshold * self.persistence_threshold;

        self.collisions.retain(|pair, data| {
            let (Some(a), Some(b)) = (find_body(bodies, data.body_a), find_body(bodies, data.body_b))
            else {
                debug!(?pair, "dropping manifold of a removed body");
                return false;
            };

            data.contacts.retain_mut(|contact| {
                let world_a = a.local_to_world(contact.local_a);
                let world_b = b.local_to_world(contact.local_b);
                let separation = world_b - world_a;
                let penetration = separation.dot(contact.normal);
                let tangential = separation - contact.normal * penetration;

                let keep = (world_a - contact.anchor_a).length_squared() < threshold_sq
                    && (world_b - contact.anchor_b).length_squared() < threshold_sq
                    && tangential.length_squared() < threshold_sq
                    && penetration >= 0.0;
                if keep {
                    contact.world_a = world_a;
                    contact.world_b = world_b;
                    contact.penetration = penetration;
                    contact.persistent = true;
                }
                keep
            });

            if data.contacts.is_empty() {
                debug!(?pair, "manifold emptied");
                return false;
            }
            true
        });
    }

    /// Merge a freshly detected manifold into the cache.
    pub fn update_collision(&mut self, data: CollisionData) {
        let pair = IdPair::new(data.body_a, data.body_b);
        let mut data = if data.body_a == pair.first {
            data
        } else {
            data.flipped()
        };
        if data.contacts.is_empty() {
            return;
        }

        let threshold_sq = self.persistence_threshold * self.persistence_threshold;
        match self.collisions.get_mut(&pair) {
            Some(cached) => {
                for contact in data.contacts {
                    add_new_contact(&mut cached.contacts, contact, threshold_sq);
                }
                limit_contact_count(&mut cached.contacts, self.max_contacts);
                cached.active = true;
            }
            None => {
                debug!(?pair, contacts = data.contacts.len(), "new manifold");
                limit_contact_count(&mut data.contacts, self.max_contacts);
                data.active = true;
                self.collisions.insert(pair, data);
            }
        }
    }

    pub fn mark_collisions_as_inactive(&mut self) {
        for data in self.collisions.values_mut() {
            data.active = false;
        }
    }

    /// Drop manifolds not re-detected since the last
    /// [`mark_collisions_as_inactive`](Self::mark_collisions_as_inactive).
    pub fn remove_inactive_collisions(&mut self) {
        self.collisions.retain(|_, data| data.active);
    }

    /// Drop every manifold involving `id`.
    pub fn remove_body(&mut self, id: BodyId) {
        self.collisions.retain(|pair, _| !pair.contains(id));
    }
}

/// Replace the cached contact whose anchor on A lies within the threshold of
/// the new one, or append the new contact. A replacement keeps the cached
/// contact's `persistent` flag.
fn add_new_contact(contacts: &mut Vec<Contact>, contact: Contact, threshold_sq: f32) {
    let existing = contacts
        .iter()
        .position(|c| (c.world_a - contact.world_a).length_squared() < threshold_sq);
    match existing {
        Some(index) => {
            let persistent = contacts[index].persistent;
            let mut replacement = contact;
            replacement.persistent = persistent;
            contacts[index] = replacement;
        }
        None => contacts.push(contact),
    }
}

/// Reduce a manifold to at most `max_contacts` points.
///
/// Picks, in order: the deepest contact, the contact farthest from it, the
/// contact farthest from the line through the first two, and the contact
/// farthest outside the triangle of the first three.
pub fn limit_contact_count(contacts: &mut Vec<Contact>, max_contacts: usize) {
    if contacts.len() <= max_contacts {
        return;
    }

    let mut selected: Vec<usize> = Vec::with_capacity(4);

    let deepest = max_index(contacts, |c| c.penetration);
    selected.push(deepest);
    let p1 = contacts[deepest].world_b;

    if max_contacts >= 2 {
        let farthest = max_index_excluding(contacts, &selected, |c| {
            (c.world_b - p1).length_squared()
        });
        if let Some(i) = farthest {
            selected.push(i);
        }
    }

    if max_contacts >= 3 && selected.len() == 2 {
        let p2 = contacts[selected[1]].world_b;
        let farthest = max_index_excluding(contacts, &selected, |c| {
            distance_sq_to_line(c.world_b, p1, p2)
        });
        if let Some(i) = farthest {
            selected.push(i);
        }
    }

    if max_contacts >= 4 && selected.len() == 3 {
        let p2 = contacts[selected[1]].world_b;
        let p3 = contacts[selected[2]].world_b;
        let farthest = max_index_excluding(contacts, &selected, |c| {
            let closest = closest_point_on_triangle(c.world_b, p1, p2, p3);
            (c.world_b - closest).length_squared()
        });
        if let Some(i) = farthest {
            let closest = closest_point_on_triangle(contacts[i].world_b, p1, p2, p3);
            if (contacts[i].world_b - closest).length_squared() > MANIFOLD_AREA_EPSILON {
                selected.push(i);
            }
        }
    }

    let kept = selected.iter().map(|&i| contacts[i]).collect();
    *contacts = kept;
}

/// Index of the first contact maximizing `key`. `contacts` must not be empty.
fn max_index(contacts: &[Contact], key: impl Fn(&Contact) -> f32) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, contact) in contacts.iter().enumerate() {
        let value = key(contact);
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

fn max_index_excluding(
    contacts: &[Contact],
    excluded: &[usize],
    key: impl Fn(&Contact) -> f32,
) -> Option<usize> {
    let mut best = None;
    let mut best_value = f32::NEG_INFINITY;
    for (i, contact) in contacts.iter().enumerate() {
        if excluded.contains(&i) {
            continue;
        }
        let value = key(contact);
        if value > best_value {
            best = Some(i);
            best_value = value;
        }
    }
    best
}

fn distance_sq_to_line(p: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return ap.length_squared();
    }
    ap.cross(ab).length_squared() / len_sq
}

/// Closest point to `p` on triangle `abc` (Voronoi region walk).
fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() <= f32::EPSILON {
        return a;
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}
