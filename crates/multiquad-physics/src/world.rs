//! Rapier-backed implementation of [`PhysicsEngine`].

use std::sync::Arc;

use multiquad_math::{Quat, Vec3};
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RopeJointBuilder,
};
use rapier3d::geometry::{BroadPhaseMultiSap, ColliderBuilder, ColliderSet, NarrowPhase};
use rapier3d::pipeline::PhysicsPipeline;
use tracing::debug;

use crate::engine::{
    BodyId, BodyState, PhysicsEngine, Pose, SimSnapshot, StepTiming, QPOS_PER_BODY, QVEL_PER_BODY,
};
use crate::error::PhysicsError;
use crate::rotors::{x_layout, Rotor};
use crate::scene::{BodyKind, SceneDescription};

/// Rapier state that changes while stepping.
#[derive(Clone)]
struct WorldSets {
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
}

impl WorldSets {
    fn new() -> Self {
        Self {
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
        }
    }
}

/// Immutable simulation snapshot produced by [`RapierEngine`].
#[derive(Clone)]
pub struct RapierSnapshot {
    sets: WorldSets,
    handles: Arc<[RigidBodyHandle]>,
    /// Linear and angular acceleration per body over the last control interval.
    accelerations: Vec<(Vec3, Vec3)>,
    time: f64,
}

impl SimSnapshot for RapierSnapshot {
    fn body_state(&self, body: BodyId) -> Result<BodyState, PhysicsError> {
        let handle = self
            .handles
            .get(body.index())
            .ok_or(PhysicsError::UnknownBody(body.index()))?;
        let rb = self
            .sets
            .bodies
            .get(*handle)
            .ok_or(PhysicsError::UnknownBody(body.index()))?;
        let (linacc, angacc) = self.accelerations[body.index()];
        let pos = rb.position();

        Ok(BodyState {
            pose: Pose {
                position: to_f64(&pos.translation.vector),
                orientation: Quat::new(
                    pos.rotation.w as f64,
                    pos.rotation.i as f64,
                    pos.rotation.j as f64,
                    pos.rotation.k as f64,
                ),
            },
            linvel: to_f64(rb.linvel()),
            angvel: to_f64(rb.angvel()),
            linacc,
            angacc,
        })
    }

    fn time(&self) -> f64 {
        self.time
    }
}

/// Physics engine for a [`SceneDescription`], built on Rapier3d.
///
/// The scene is converted into a template world once; `init` clones the
/// template and `step` clones the incoming snapshot, so snapshots are never
/// mutated after they are returned.
pub struct RapierEngine {
    template: WorldSets,
    handles: Arc<[RigidBodyHandle]>,
    names: Vec<String>,
    rotors: Vec<Rotor>,
    gravity: Vector3<f32>,
    timing: StepTiming,
    nominal_qpos: Vec<f64>,
}

impl RapierEngine {
    /// Build the template world for `scene`.
    pub fn from_scene(scene: &SceneDescription, timing: StepTiming) -> Result<Self, PhysicsError> {
        scene.validate()?;
        if !(timing.dt > 0.0) || timing.substeps == 0 {
            return Err(PhysicsError::InvalidTiming(format!(
                "dt = {}, substeps = {}",
                timing.dt, timing.substeps
            )));
        }

        let mut sets = WorldSets::new();
        let mut handles = Vec::with_capacity(scene.bodies.len());
        let mut rotors = Vec::new();

        for (index, body) in scene.bodies.iter().enumerate() {
            let pose = isometry(&body.position, &body.orientation);
            let rigid_body = RigidBodyBuilder::dynamic()
                .position(pose)
                .can_sleep(false)
                .build();
            let handle = sets.bodies.insert(rigid_body);
            handles.push(handle);

            let collider = match &body.kind {
                BodyKind::Payload { radius } => ColliderBuilder::ball(*radius as f32),
                BodyKind::Quadrotor {
                    half_extents,
                    arm_length,
                    yaw_torque_coeff,
                } => {
                    rotors.extend(x_layout(
                        index,
                        *arm_length as f32,
                        *yaw_torque_coeff as f32,
                    ));
                    ColliderBuilder::cuboid(
                        half_extents[0] as f32,
                        half_extents[1] as f32,
                        half_extents[2] as f32,
                    )
                }
            }
            .mass(body.mass as f32)
            .friction(0.5)
            .restitution(0.1)
            .build();
            sets.colliders
                .insert_with_parent(collider, handle, &mut sets.bodies);
        }

        if scene.ground {
            let ground = ColliderBuilder::halfspace(Vector3::z_axis())
                .friction(0.5)
                .restitution(0.1)
                .build();
            sets.colliders.insert(ground);
        }

        for cable in &scene.cables {
            let from = handles[scene.index_of(&cable.from)?];
            let to = handles[scene.index_of(&cable.to)?];
            let rope = RopeJointBuilder::new(cable.length as f32)
                .local_anchor1(to_point(&cable.from_anchor))
                .local_anchor2(to_point(&cable.to_anchor))
                .build();
            sets.impulse_joints.insert(from, to, rope, true);
        }

        debug!(
            bodies = handles.len(),
            actuators = rotors.len(),
            cables = scene.cables.len(),
            dt = timing.dt,
            substeps = timing.substeps,
            "built physics template"
        );

        let g = scene.gravity;
        Ok(Self {
            template: sets,
            handles: handles.into(),
            names: scene.bodies.iter().map(|b| b.name.clone()).collect(),
            rotors,
            gravity: Vector3::new(g[0] as f32, g[1] as f32, g[2] as f32),
            timing,
            nominal_qpos: scene.nominal_qpos(),
        })
    }

    /// Names of all bodies in scene order.
    pub fn body_names(&self) -> &[String] {
        &self.names
    }

    fn velocities(&self, sets: &WorldSets) -> Vec<(Vec3, Vec3)> {
        self.handles
            .iter()
            .map(|h| {
                let rb = &sets.bodies[*h];
                (to_f64(rb.linvel()), to_f64(rb.angvel()))
            })
            .collect()
    }

    fn apply_rotor_forces(&self, bodies: &mut RigidBodySet, controls: &[f64]) {
        for handle in self.actuated_handles() {
            if let Some(rb) = bodies.get_mut(handle) {
                rb.reset_forces(true);
                rb.reset_torques(true);
            }
        }

        for (rotor, &thrust) in self.rotors.iter().zip(controls) {
            if let Some(rb) = bodies.get_mut(self.handles[rotor.body]) {
                let wrench = rotor.wrench(rb.position(), thrust as f32);
                rb.add_force_at_point(wrench.force, wrench.point, true);
                rb.add_torque(wrench.torque, true);
            }
        }
    }

    fn actuated_handles(&self) -> impl Iterator<Item = RigidBodyHandle> + '_ {
        let mut last = None;
        self.rotors.iter().filter_map(move |r| {
            if last == Some(r.body) {
                None
            } else {
                last = Some(r.body);
                Some(self.handles[r.body])
            }
        })
    }
}

impl PhysicsEngine for RapierEngine {
    type Snapshot = RapierSnapshot;

    fn resolve(&self, name: &str) -> Result<BodyId, PhysicsError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(BodyId::from_index)
            .ok_or_else(|| PhysicsError::MissingBody(name.to_string()))
    }

    fn timing(&self) -> StepTiming {
        self.timing
    }

    fn num_actuators(&self) -> usize {
        self.rotors.len()
    }

    fn actuated_body(&self, actuator: usize) -> Option<BodyId> {
        self.rotors.get(actuator).map(|r| BodyId::from_index(r.body))
    }

    fn nq(&self) -> usize {
        self.handles.len() * QPOS_PER_BODY
    }

    fn nv(&self) -> usize {
        self.handles.len() * QVEL_PER_BODY
    }

    fn nominal_qpos(&self) -> Vec<f64> {
        self.nominal_qpos.clone()
    }

    fn init(&self, qpos: &[f64], qvel: &[f64]) -> Result<RapierSnapshot, PhysicsError> {
        check_len("qpos", self.nq(), qpos.len())?;
        check_len("qvel", self.nv(), qvel.len())?;

        let mut sets = self.template.clone();
        for (i, handle) in self.handles.iter().enumerate() {
            let q = &qpos[i * QPOS_PER_BODY..(i + 1) * QPOS_PER_BODY];
            let v = &qvel[i * QVEL_PER_BODY..(i + 1) * QVEL_PER_BODY];

            let orientation = [q[3], q[4], q[5], q[6]];
            let norm = orientation.iter().map(|c| c * c).sum::<f64>().sqrt();
            if norm == 0.0 || !norm.is_finite() {
                return Err(PhysicsError::InvalidState {
                    body: self.names[i].clone(),
                    reason: format!("orientation {orientation:?} cannot be normalized"),
                });
            }

            let rb = &mut sets.bodies[*handle];
            rb.set_position(isometry(&[q[0], q[1], q[2]], &orientation), true);
            rb.set_linvel(Vector3::new(v[0] as f32, v[1] as f32, v[2] as f32), true);
            rb.set_angvel(Vector3::new(v[3] as f32, v[4] as f32, v[5] as f32), true);
        }

        Ok(RapierSnapshot {
            sets,
            handles: Arc::clone(&self.handles),
            accelerations: vec![(Vec3::zeros(), Vec3::zeros()); self.handles.len()],
            time: 0.0,
        })
    }

    fn step(
        &self,
        snapshot: &RapierSnapshot,
        controls: &[f64],
    ) -> Result<RapierSnapshot, PhysicsError> {
        if controls.len() != self.rotors.len() {
            return Err(PhysicsError::ActuatorDimension {
                expected: self.rotors.len(),
                got: controls.len(),
            });
        }

        let mut next = snapshot.clone();
        let before = self.velocities(&next.sets);

        let mut pipeline = PhysicsPipeline::new();
        let mut ccd_solver = CCDSolver::new();
        let mut params = IntegrationParameters::default();
        params.dt = self.timing.dt as f32;

        let sets = &mut next.sets;
        for _ in 0..self.timing.substeps {
            self.apply_rotor_forces(&mut sets.bodies, controls);
            pipeline.step(
                &self.gravity,
                &params,
                &mut sets.islands,
                &mut sets.broad_phase,
                &mut sets.narrow_phase,
                &mut sets.bodies,
                &mut sets.colliders,
                &mut sets.impulse_joints,
                &mut sets.multibody_joints,
                &mut ccd_solver,
                None,
                &(),
                &(),
            );
        }

        let interval = self.timing.control_interval();
        let after = self.velocities(&next.sets);
        next.accelerations = before
            .iter()
            .zip(&after)
            .map(|((v0, w0), (v1, w1))| ((v1 - v0) / interval, (w1 - w0) / interval))
            .collect();
        next.time = snapshot.time + interval;

        Ok(next)
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), PhysicsError> {
    if expected == got {
        Ok(())
    } else {
        Err(PhysicsError::StateDimension {
            what,
            expected,
            got,
        })
    }
}

fn isometry(position: &[f64; 3], wxyz: &[f64; 4]) -> Isometry3<f32> {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        wxyz[0] as f32,
        wxyz[1] as f32,
        wxyz[2] as f32,
        wxyz[3] as f32,
    ));
    Isometry3::from_parts(
        Translation3::new(position[0] as f32, position[1] as f32, position[2] as f32),
        rotation,
    )
}

fn to_point(p: &[f64; 3]) -> Point3<f32> {
    Point3::new(p[0] as f32, p[1] as f32, p[2] as f32)
}

fn to_f64(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x as f64, v.y as f64, v.z as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine(substeps: u32) -> RapierEngine {
        let timing = StepTiming::from_policy(250.0, substeps).unwrap();
        RapierEngine::from_scene(&SceneDescription::two_quad_payload(), timing).unwrap()
    }

    fn at_rest(engine: &RapierEngine) -> RapierSnapshot {
        engine
            .init(&engine.nominal_qpos(), &vec![0.0; engine.nv()])
            .unwrap()
    }

    #[test]
    fn test_resolve_bodies() {
        let engine = engine(1);
        assert_eq!(engine.resolve("payload").unwrap().index(), 0);
        assert_eq!(engine.resolve("q1_cf2").unwrap().index(), 2);
        assert!(matches!(
            engine.resolve("q9_cf2"),
            Err(PhysicsError::MissingBody(_))
        ));
        assert_eq!(engine.num_actuators(), 8);
        assert_eq!(engine.actuated_body(0), Some(BodyId::from_index(1)));
        assert_eq!(engine.actuated_body(7), Some(BodyId::from_index(2)));
        assert_eq!(engine.actuated_body(8), None);
        assert_eq!(engine.nq(), 21);
        assert_eq!(engine.nv(), 18);
    }

    #[test]
    fn test_init_reads_back_state() {
        let engine = engine(1);
        let mut qvel = vec![0.0; engine.nv()];
        qvel[6] = 0.25; // q0_cf2 vx
        let snap = engine.init(&engine.nominal_qpos(), &qvel).unwrap();

        let q0 = snap.body_state(engine.resolve("q0_cf2").unwrap()).unwrap();
        assert_relative_eq!(q0.position(), Vec3::new(-0.12, 0.0, 0.87), epsilon = 1e-6);
        assert_relative_eq!(q0.linvel.x, 0.25, epsilon = 1e-6);
        assert_relative_eq!(q0.pose.orientation.w, 1.0, epsilon = 1e-6);
        assert_eq!(snap.time(), 0.0);
    }

    #[test]
    fn test_init_rejects_bad_dimensions() {
        let engine = engine(1);
        assert!(matches!(
            engine.init(&[0.0; 3], &vec![0.0; engine.nv()]),
            Err(PhysicsError::StateDimension { what: "qpos", .. })
        ));

        let mut qpos = engine.nominal_qpos();
        qpos[3..7].copy_from_slice(&[0.0; 4]);
        assert!(matches!(
            engine.init(&qpos, &vec![0.0; engine.nv()]),
            Err(PhysicsError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_step_advances_time_without_mutating_input() {
        let engine = engine(4);
        let snap = at_rest(&engine);
        let next = engine.step(&snap, &[0.0; 8]).unwrap();

        assert_relative_eq!(next.time(), 0.004, epsilon = 1e-12);
        assert_eq!(snap.time(), 0.0);

        let payload = engine.resolve("payload").unwrap();
        let moved = next.body_state(payload).unwrap();
        let before = snap.body_state(payload).unwrap();
        assert!(moved.linvel.z < 0.0, "payload should start falling");
        assert_eq!(before.linvel, Vec3::zeros());
        assert!(moved.linacc.z < 0.0);
    }

    #[test]
    fn test_full_thrust_lifts_quads() {
        let engine = engine(1);
        let mut snap = at_rest(&engine);
        for _ in 0..20 {
            snap = engine.step(&snap, &[0.11772; 8]).unwrap();
        }
        let q0 = snap.body_state(engine.resolve("q0_cf2").unwrap()).unwrap();
        assert!(q0.linvel.z > 0.0);
    }

    #[test]
    fn test_step_rejects_wrong_actuator_count() {
        let engine = engine(1);
        let snap = at_rest(&engine);
        assert!(matches!(
            engine.step(&snap, &[0.0; 4]),
            Err(PhysicsError::ActuatorDimension { expected: 8, got: 4 })
        ));
    }

    #[test]
    fn test_invalid_timing() {
        let timing = StepTiming { dt: 0.0, substeps: 1 };
        assert!(RapierEngine::from_scene(&SceneDescription::default(), timing).is_err());
    }
}
