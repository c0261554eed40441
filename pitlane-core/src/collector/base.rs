//! Collection loop.
use super::{CollectStat, CollectorConfig, Outcome};
use crate::{
    base::Simulator,
    control::Action,
    env::Environment,
    reward::RewardModel,
    state::StateSnapshot,
    PitlaneError,
};
use anyhow::Result;
use log::{debug, info, warn};
use std::time::Instant;

struct Slot {
    pending: Option<(StateSnapshot, Action)>,
    stat: CollectStat,
    active: bool,
    // first step after the last frame the agent took
    flush_from: usize,
}

/// Drives the agents of an [`Environment`] tick by tick.
///
/// The agents must have their reporting initialized. At every step:
///
/// 1. The world is ticked.
/// 2. The states of the active agents are taken.
/// 3. The transition from the previous state of each agent is scored with the
///    [`RewardModel`].
/// 4. The transition is done if the agent reached the finish threshold,
///    collided, or the step limit was hit.
/// 5. The row `<previous state>,<action>,reward,done` is reported.
/// 6. The actions of the agents still active are computed and applied
///    together.
///
/// Agents that are done stop stepping and brake. When all agents are done,
/// the frames their cameras retained without saving are flushed, numbered
/// from the step after the last state of each agent, and the agents are
/// destroyed, keeping their data.
pub struct Collector {
    config: CollectorConfig,
    reward: RewardModel,
}

impl Collector {
    /// Constructs a collector.
    pub fn new(config: CollectorConfig) -> Self {
        let reward = RewardModel::from(&config.reward);
        Self { config, reward }
    }

    /// Configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    fn outcome(&self, state: &StateSnapshot, step: usize) -> Option<Outcome> {
        if state.distance_to_finish <= self.config.finish_threshold {
            Some(Outcome::Finished)
        } else if state.collisions > 0.0 {
            Some(Outcome::Collided)
        } else if step >= self.config.max_steps {
            Some(Outcome::MaxSteps)
        } else {
            None
        }
    }

    /// Runs the agents of `env` until all of them are done.
    ///
    /// Returns the stats of the agents in pool order.
    pub fn collect<S: Simulator>(&self, env: &mut Environment<S>) -> Result<Vec<CollectStat>> {
        let start = Instant::now();
        let mut slots: Vec<Slot> = env
            .agents()
            .iter()
            .map(|agent| Slot {
                pending: None,
                stat: CollectStat {
                    name: agent.name(),
                    steps: 0,
                    total_reward: 0.0,
                    outcome: Outcome::MaxSteps,
                    duration: Default::default(),
                },
                active: true,
                flush_from: 0,
            })
            .collect();
        info!("Start collecting with {} agents", slots.len());

        let mut step = 0;
        while slots.iter().any(|s| s.active) {
            env.tick()?;
            let agents = env.agents_mut();

            let mut next: Vec<Option<StateSnapshot>> = Vec::with_capacity(agents.len());
            for (agent, slot) in agents.iter_mut().zip(slots.iter_mut()) {
                if !slot.active {
                    agent.discard_pending_frames();
                    next.push(None);
                    continue;
                }
                let state = match agent.get_state(step, self.config.retrieve_data) {
                    Ok(state) => state,
                    Err(e) => {
                        warn!("{} failed at step {}: {}", slot.stat.name, step, e);
                        slot.stat.outcome = Outcome::Failed(e.to_string());
                        slot.stat.duration = start.elapsed();
                        slot.active = false;
                        slot.flush_from = step;
                        next.push(None);
                        continue;
                    }
                };

                if let Some((prior, action)) = slot.pending.take() {
                    let (reward, outcome) =
                        match self.reward.score(&prior, &state, agent.track(), prior.step) {
                            Ok(reward) => (reward, self.outcome(&state, step)),
                            Err(PitlaneError::DivisionHazard(what)) => {
                                debug!("{}: {}", slot.stat.name, what);
                                (0.0, Some(Outcome::DivisionHazard))
                            }
                            Err(e) => return Err(e.into()),
                        };
                    if let Err(e) = agent.report(&prior, &action, reward, outcome.is_some()) {
                        warn!("{} failed to report step {}: {}", slot.stat.name, prior.step, e);
                        slot.stat.outcome = Outcome::Failed(e.to_string());
                        slot.stat.duration = start.elapsed();
                        slot.active = false;
                        slot.flush_from = step + 1;
                        next.push(None);
                        continue;
                    }
                    slot.stat.steps += 1;
                    slot.stat.total_reward += reward;
                    if let Some(outcome) = outcome {
                        info!("{} done at step {}: {}", slot.stat.name, step, outcome);
                        slot.stat.outcome = outcome;
                        slot.stat.duration = start.elapsed();
                        slot.active = false;
                        slot.flush_from = step + 1;
                        if let Err(e) = agent.apply_action(&Action::new(-1.0, 0.0)) {
                            warn!("{}", e);
                        }
                        next.push(None);
                        continue;
                    }
                }
                next.push(Some(state));
            }

            let mut actions = vec![];
            for ((agent, slot), state) in agents.iter_mut().zip(slots.iter()).zip(next.iter()) {
                if let (true, Some(state)) = (slot.active, state) {
                    actions.push(Some(agent.play_step(state, true)?));
                } else {
                    actions.push(None);
                }
            }
            for (((agent, slot), state), action) in agents
                .iter()
                .zip(slots.iter_mut())
                .zip(next.into_iter())
                .zip(actions.into_iter())
            {
                if let (Some(state), Some(action)) = (state, action) {
                    if let Err(e) = agent.apply_action(&action) {
                        warn!("Failed to apply action of {}: {}", slot.stat.name, e);
                    }
                    slot.pending = Some((state, action));
                }
            }
            step += 1;
        }

        for (agent, slot) in env.agents_mut().iter_mut().zip(slots.iter()) {
            if let Err(e) = agent.destroy(false, Some(slot.flush_from)) {
                warn!("{}", e);
            }
        }
        info!("Collected {} steps in {:?}", step, start.elapsed());
        Ok(slots.into_iter().map(|s| s.stat).collect())
    }
}
