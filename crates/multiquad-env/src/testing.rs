//! Deterministic kinematic engine for unit tests.
//!
//! Bodies keep their orientation and move at constant velocity; actuator
//! commands are checked for length and otherwise ignored.

use multiquad_math::{quat_from_wxyz, Vec3};
use multiquad_physics::{
    BodyId, BodyState, PhysicsEngine, PhysicsError, Pose, SimSnapshot, StepTiming, QPOS_PER_BODY,
    QVEL_PER_BODY,
};

#[derive(Debug, Clone)]
pub(crate) struct KinematicSnapshot {
    bodies: Vec<BodyState>,
    time: f64,
}

impl SimSnapshot for KinematicSnapshot {
    fn body_state(&self, body: BodyId) -> Result<BodyState, PhysicsError> {
        self.bodies
            .get(body.index())
            .copied()
            .ok_or(PhysicsError::UnknownBody(body.index()))
    }

    fn time(&self) -> f64 {
        self.time
    }
}

pub(crate) struct KinematicEngine {
    names: Vec<String>,
    nominal: Vec<f64>,
    timing: StepTiming,
}

impl KinematicEngine {
    /// Bodies named `payload`, `q0_cf2`, `q1_cf2` at the given positions.
    pub(crate) fn new(payload: [f64; 3], agent1: [f64; 3], agent2: [f64; 3]) -> Self {
        let mut nominal = Vec::new();
        for p in [payload, agent1, agent2] {
            nominal.extend(p);
            nominal.extend([1.0, 0.0, 0.0, 0.0]);
        }
        Self {
            names: vec!["payload".into(), "q0_cf2".into(), "q1_cf2".into()],
            nominal,
            timing: StepTiming::from_policy(250.0, 1).unwrap(),
        }
    }

    /// Payload at the default target, agents 0.15 apart above it.
    pub(crate) fn golden() -> Self {
        Self::new([0.0, 0.0, 1.0], [-0.075, 0.0, 1.3], [0.075, 0.0, 1.3])
    }

    pub(crate) fn with_timing(mut self, timing: StepTiming) -> Self {
        self.timing = timing;
        self
    }
}

impl PhysicsEngine for KinematicEngine {
    type Snapshot = KinematicSnapshot;

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
        8
    }

    fn actuated_body(&self, actuator: usize) -> Option<BodyId> {
        (actuator < 8).then(|| BodyId::from_index(1 + actuator / 4))
    }

    fn nq(&self) -> usize {
        self.names.len() * QPOS_PER_BODY
    }

    fn nv(&self) -> usize {
        self.names.len() * QVEL_PER_BODY
    }

    fn nominal_qpos(&self) -> Vec<f64> {
        self.nominal.clone()
    }

    fn init(&self, qpos: &[f64], qvel: &[f64]) -> Result<KinematicSnapshot, PhysicsError> {
        let bodies = qpos
            .chunks(QPOS_PER_BODY)
            .zip(qvel.chunks(QVEL_PER_BODY))
            .map(|(q, v)| BodyState {
                pose: Pose {
                    position: Vec3::new(q[0], q[1], q[2]),
                    orientation: quat_from_wxyz([q[3], q[4], q[5], q[6]]),
                },
                linvel: Vec3::new(v[0], v[1], v[2]),
                angvel: Vec3::new(v[3], v[4], v[5]),
                linacc: Vec3::zeros(),
                angacc: Vec3::zeros(),
            })
            .collect();
        Ok(KinematicSnapshot { bodies, time: 0.0 })
    }

    fn step(
        &self,
        snapshot: &KinematicSnapshot,
        controls: &[f64],
    ) -> Result<KinematicSnapshot, PhysicsError> {
        if controls.len() != 8 {
            return Err(PhysicsError::ActuatorDimension {
                expected: 8,
                got: controls.len(),
            });
        }
        let interval = self.timing.control_interval();
        let mut next = snapshot.clone();
        for body in &mut next.bodies {
            body.pose.position += body.linvel * interval;
        }
        next.time += interval;
        Ok(next)
    }
}
