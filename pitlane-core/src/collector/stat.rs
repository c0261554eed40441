use std::{fmt, time::Duration};

/// Why an agent stopped collecting.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The agent reached the end of its track.
    Finished,

    /// The agent collided.
    Collided,

    /// The step limit was reached.
    MaxSteps,

    /// The reward of the last transition divided by zero; the transition
    /// counts as finished with reward 0.
    DivisionHazard,

    /// The state of the agent could not be taken.
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Finished => write!(f, "finished"),
            Outcome::Collided => write!(f, "collided"),
            Outcome::MaxSteps => write!(f, "max steps"),
            Outcome::DivisionHazard => write!(f, "division hazard"),
            Outcome::Failed(e) => write!(f, "failed ({})", e),
        }
    }
}

/// Stats of one agent in a [Collector](crate::Collector) run.
#[derive(Clone, Debug)]
pub struct CollectStat {
    /// Name of the agent.
    pub name: String,

    /// The number of reported transitions.
    pub steps: usize,

    /// Sum of the rewards.
    pub total_reward: f64,

    /// Why the agent stopped.
    pub outcome: Outcome,

    /// Duration of the run until the agent stopped.
    pub duration: Duration,
}

/// Returns a formatted string of the set of [CollectStat] for reporting.
pub fn collect_stats_fmt(stats: &[CollectStat]) -> String {
    let mut s = "agent, steps, total reward, outcome, duration [sec]\n".to_string();
    for stat in stats.iter() {
        s += format!(
            "{}, {}, {:.4}, {}, {:.2}\n",
            stat.name,
            stat.steps,
            stat.total_reward,
            stat.outcome,
            stat.duration.as_secs_f32()
        )
        .as_str();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_table() {
        let stats = vec![CollectStat {
            name: "WaypointController_rgb_collisions_3".to_string(),
            steps: 10,
            total_reward: 1.5,
            outcome: Outcome::Failed("timeout".to_string()),
            duration: Duration::from_millis(1500),
        }];
        let s = collect_stats_fmt(&stats);
        let lines: Vec<_> = s.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "WaypointController_rgb_collisions_3, 10, 1.5000, failed (timeout), 1.50"
        );
    }
}
