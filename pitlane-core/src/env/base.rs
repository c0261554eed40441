//! Environment orchestrating agents in one simulated world.
use super::EnvironmentConfig;
use crate::{
    agent::{Agent, AgentConfig},
    base::{SpawnPoint, Simulator, Transform},
    control::{Action, Controller},
    record::Storage,
    state::StateSnapshot,
    PitlaneError,
};
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;

/// Outcome of [`Environment::stabilize_vehicles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stabilization {
    /// All transforms were unchanged over one tick.
    Converged {
        /// Ticks issued.
        ticks: usize,
    },

    /// The tick cap was hit while vehicles were still moving.
    TimedOut {
        /// Ticks issued.
        ticks: usize,
    },
}

impl Stabilization {
    /// Ticks issued.
    pub fn ticks(&self) -> usize {
        match self {
            Self::Converged { ticks } | Self::TimedOut { ticks } => *ticks,
        }
    }
}

/// Spawn indices of `count` agents spread evenly over `len` points.
///
/// Equivalent to `linspace(0, len - len / count, count)` truncated to integers,
/// shifted by `offset` modulo `len`.
pub fn spawn_indexes(count: usize, len: usize, offset: usize) -> Vec<usize> {
    if count == 0 || len == 0 {
        return vec![];
    }
    let stop = len as f64 - len as f64 / count as f64;
    (0..count)
        .map(|i| {
            let x = if count == 1 {
                0.0
            } else if i == count - 1 {
                stop
            } else {
                stop / (count - 1) as f64 * i as f64
            };
            (x as usize + offset) % len
        })
        .collect()
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Owns the simulator handle and a pool of agents.
///
/// Only the environment ticks the world or changes its settings. A collection
/// run goes through the following calls:
///
/// ```mermaid
/// graph LR
///     A[reset_env]-->B[init_agents]
///     B-->C[initialize_agents_sensors]
///     C-->D[stabilize_vehicles]
///     D-->E[initialize_agents_reporting]
///     E-->F[release_agents_control]
///     F-->G[tick, get_agents_states, get_agents_actions]
///     G-->G
///     G-->H[destroy_agents]
/// ```
///
/// Batch operations isolate the failures of single agents: they are logged,
/// and agents whose initialization failed are destroyed and removed.
pub struct Environment<S: Simulator> {
    sim: Arc<S>,
    storage: Arc<dyn Storage>,
    agents: Vec<Agent<S>>,
    rng: StdRng,
    config: EnvironmentConfig,
}

impl<S: Simulator> Environment<S> {
    /// Creates an environment without agents.
    pub fn new(sim: Arc<S>, storage: Arc<dyn Storage>, config: EnvironmentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            sim,
            storage,
            agents: vec![],
            rng,
            config,
        }
    }

    /// The simulator.
    pub fn sim(&self) -> &Arc<S> {
        &self.sim
    }

    /// Agents of the pool.
    pub fn agents(&self) -> &[Agent<S>] {
        &self.agents
    }

    /// Agents of the pool.
    pub fn agents_mut(&mut self) -> &mut [Agent<S>] {
        &mut self.agents
    }

    /// Advances the world by one tick.
    pub fn tick(&self) -> Result<u64> {
        self.sim.tick()
    }

    /// Destroys the agents and loads `map`, or reloads it if already loaded.
    ///
    /// With `synchronous`, the world is switched to fixed steps of
    /// `1 / frame_rate` seconds unless already synchronous.
    pub fn reset_env(&mut self, map: &str, synchronous: bool, frame_rate: u32) -> Result<()> {
        if frame_rate == 0 {
            return Err(anyhow!("frame_rate must be positive"));
        }
        self.destroy_agents();

        if self.sim.map_name()?.trim() != map.trim() {
            info!("Load map {}", map);
            self.sim.load_world(map)?;
        } else {
            info!("Reload map {}", map);
            self.sim.reload_world()?;
        }

        let mut settings = self.sim.settings()?;
        if synchronous && !settings.synchronous_mode {
            settings.synchronous_mode = true;
            settings.fixed_delta_seconds = Some(1.0 / frame_rate as f64);
            self.sim.apply_settings(&settings)?;
            debug!("Synchronous mode at {} frames per second", frame_rate);
        }
        Ok(())
    }

    /// Spawns `count` agents spread evenly over `spawn_points`.
    ///
    /// The spread is shifted by one random offset. The controller of the i-th
    /// agent is created with `controllers(i)`. Agents failing to spawn are
    /// logged and skipped. Returns the number of spawned agents.
    pub fn init_agents<F>(
        &mut self,
        count: usize,
        agent_config: &AgentConfig,
        spawn_points: &[SpawnPoint],
        mut controllers: F,
    ) -> Result<usize>
    where
        F: FnMut(usize) -> Box<dyn Controller>,
    {
        if spawn_points.is_empty() {
            return Err(PitlaneError::InvalidTrack("no spawn points".to_string()))?;
        }
        let offset = self.rng.gen_range(0..spawn_points.len());
        let indexes = spawn_indexes(count, spawn_points.len(), offset);
        debug!("Spawn indexes {:?}", indexes);

        let mut spawned = 0;
        for (i, idx) in indexes.into_iter().enumerate() {
            let agent = Agent::new(
                self.sim.clone(),
                controllers(i),
                agent_config.clone(),
                spawn_points,
                Some(idx),
                self.storage.clone(),
            );
            let mut agent = match agent {
                Ok(agent) => agent,
                Err(e) => {
                    warn!("Agent at point {} not created: {}", idx, e);
                    continue;
                }
            };
            match agent.initialize_vehicle() {
                Ok(()) => {
                    self.agents.push(agent);
                    spawned += 1;
                }
                Err(e) => warn!("{}", e),
            }
        }

        for _ in 0..self.config.settle_ticks {
            self.sim.tick()?;
        }
        info!("Spawned {} of {} agents", spawned, count);
        Ok(spawned)
    }

    fn transforms(&self) -> Result<Vec<Transform>> {
        self.agents.iter().map(|a| a.transform()).collect()
    }

    /// Ticks until no vehicle moves over one tick, at most
    /// `max_stabilization_ticks` times.
    ///
    /// Hitting the cap is not an error. Frames delivered by the cameras during
    /// stabilization are discarded.
    pub fn stabilize_vehicles(&mut self) -> Result<Stabilization> {
        if self.agents.is_empty() {
            return Ok(Stabilization::Converged { ticks: 0 });
        }

        let mut previous = self.transforms()?;
        let mut ticks = 0;
        let outcome = loop {
            if ticks >= self.config.max_stabilization_ticks {
                warn!("Vehicles not stabilized after {} ticks", ticks);
                break Stabilization::TimedOut { ticks };
            }
            self.sim.tick()?;
            ticks += 1;
            let current = self.transforms()?;
            if current == previous {
                debug!("Vehicles stabilized after {} ticks", ticks);
                break Stabilization::Converged { ticks };
            }
            previous = current;
        };

        let discarded = self.discard_stale_frames();
        if discarded > 0 {
            debug!("Discarded {} frames delivered during stabilization", discarded);
        }
        Ok(outcome)
    }

    /// Drops the frames queued on the cameras of all agents.
    pub fn discard_stale_frames(&mut self) -> usize {
        self.agents
            .iter_mut()
            .map(|a| a.discard_pending_frames())
            .sum()
    }

    /// Initializes the sensors of every agent.
    ///
    /// Agents failing are destroyed and removed. Returns the number of
    /// remaining agents.
    pub fn initialize_agents_sensors(&mut self) -> usize {
        self.retain_initialized("sensors", |agent| agent.initialize_sensors())
    }

    /// Initializes the reporting of every agent.
    ///
    /// Agents failing are destroyed and removed. Returns the number of
    /// remaining agents.
    pub fn initialize_agents_reporting(&mut self) -> usize {
        self.retain_initialized("reporting", |agent| agent.init_reporting())
    }

    fn retain_initialized<F>(&mut self, what: &str, mut init: F) -> usize
    where
        F: FnMut(&mut Agent<S>) -> Result<()>,
    {
        self.agents.retain_mut(|agent| match init(agent) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to initialize {} of {}: {}", what, agent.name(), e);
                if let Err(e) = agent.destroy(true, None) {
                    warn!("{}", e);
                }
                false
            }
        });
        self.agents.len()
    }

    /// Releases the brake of every vehicle.
    pub fn release_agents_control(&self) {
        for agent in self.agents.iter() {
            if let Err(e) = agent.release_control() {
                warn!("Failed to release control of {}: {}", agent.name(), e);
            }
        }
    }

    /// Takes the states of all agents at `step`, in pool order.
    pub fn get_agents_states(
        &mut self,
        step: usize,
        retrieve_data: bool,
    ) -> Vec<Result<StateSnapshot>> {
        self.agents
            .iter_mut()
            .map(|a| a.get_state(step, retrieve_data))
            .collect()
    }

    /// Computes the actions of all agents, then applies them together.
    ///
    /// `states` are in pool order. Failures to apply an action are logged.
    pub fn get_agents_actions(&mut self, states: &[StateSnapshot]) -> Result<Vec<Action>> {
        if states.len() != self.agents.len() {
            return Err(anyhow!(
                "{} states for {} agents",
                states.len(),
                self.agents.len()
            ));
        }
        let actions = self
            .agents
            .iter_mut()
            .zip(states.iter())
            .map(|(a, s)| a.play_step(s, true))
            .collect::<Result<Vec<_>>>()?;
        for (agent, action) in self.agents.iter().zip(actions.iter()) {
            if let Err(e) = agent.apply_action(action) {
                warn!("Failed to apply action of {}: {}", agent.name(), e);
            }
        }
        Ok(actions)
    }

    /// Flips the synchronous mode of the world, for debugging.
    ///
    /// The fixed step becomes `|fixed_delta_seconds - 1 / frame_rate|`, that is,
    /// `1 / frame_rate` when switching on from a variable step and variable when
    /// switching off.
    pub fn toggle_world(&self, frame_rate: u32) -> Result<()> {
        if frame_rate == 0 {
            return Err(anyhow!("frame_rate must be positive"));
        }
        let mut settings = self.sim.settings()?;
        settings.synchronous_mode = !settings.synchronous_mode;
        let delta = (settings.fixed_delta_seconds.unwrap_or(0.0) - 1.0 / frame_rate as f64).abs();
        settings.fixed_delta_seconds = if delta > 0.0 { Some(delta) } else { None };
        self.sim.apply_settings(&settings)?;
        info!(
            "Synchronous mode {}",
            if settings.synchronous_mode { "on" } else { "off" }
        );
        Ok(())
    }

    /// Destroys every agent, keeping its in-memory data, and empties the pool.
    ///
    /// Failures are logged. The destroyed agents are returned.
    pub fn destroy_agents(&mut self) -> Vec<Agent<S>> {
        let mut agents = std::mem::take(&mut self.agents);
        for agent in agents.iter_mut() {
            if let Err(e) = agent.destroy(false, None) {
                warn!("{}", e);
            }
        }
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn spawn_indexes_are_spread_evenly() {
        assert_eq!(spawn_indexes(4, 400, 0), vec![0, 100, 200, 300]);
        assert_eq!(spawn_indexes(4, 400, 150), vec![150, 250, 350, 50]);
        assert_eq!(spawn_indexes(1, 10, 7), vec![7]);
        assert_eq!(spawn_indexes(3, 10, 0), vec![0, 3, 6]);
        assert!(spawn_indexes(0, 10, 0).is_empty());
    }

    #[test_log::test]
    fn stabilization_ticks() {
        assert_eq!(Stabilization::Converged { ticks: 3 }.ticks(), 3);
        assert_eq!(Stabilization::TimedOut { ticks: 100 }.ticks(), 100);
    }
}
