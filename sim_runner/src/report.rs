//! Plain-text rendering of aggregated results

use sim_core::metrics::AggregateMetrics;
use std::fmt::Write;

pub fn render(aggregate: &AggregateMetrics) -> String {
    let mut out = String::new();
    let iterations = aggregate.iterations;
    let mean_secs = if iterations == 0 {
        0.0
    } else {
        aggregate.simulated_secs / iterations as f64
    };
    let _ = writeln!(out, "{iterations} iterations of {mean_secs:.1}s");

    for (index, actor) in aggregate.actors.iter().enumerate() {
        if actor.dps.mean == 0.0 && actor.hps.mean == 0.0 && actor.abilities.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}: {:.1} dps (±{:.1}, min {:.1}, max {:.1})",
            actor.name,
            actor.dps.mean,
            actor.dps.std_error(),
            actor.dps.min,
            actor.dps.max
        );
        if actor.hps.mean > 0.0 {
            let _ = writeln!(out, "  {:.1} hps", actor.hps.mean);
        }

        let _ = writeln!(
            out,
            "  {:<20} {:>8} {:>12} {:>8} {:>8}",
            "ability", "casts", "damage", "crit%", "ticks"
        );
        for (label, ability) in &actor.abilities {
            let totals = &ability.totals;
            let _ = writeln!(
                out,
                "  {:<20} {:>8.1} {:>12.0} {:>7.1}% {:>8.1}",
                label,
                ability.mean_casts(iterations),
                ability.mean_damage(iterations),
                totals.crit_rate() * 100.0,
                totals.ticks as f64 / iterations.max(1) as f64
            );
        }

        for label in actor.aura_uptime.keys() {
            let _ = writeln!(
                out,
                "  uptime {:<16} {:>6.1}%",
                label,
                aggregate.uptime_fraction(index, label) * 100.0
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::metrics::{ActorMetrics, IterationMetrics};
    use std::time::Duration;

    #[test]
    fn test_render_lists_actors_and_abilities() {
        let mut aggregate = AggregateMetrics::new();
        for damage in [9_000.0, 11_000.0] {
            let mut metrics = IterationMetrics::new(0, 0, Duration::from_secs(100));
            let mut mage = ActorMetrics::new("mage");
            mage.damage_done = damage;
            let fireball = mage.ability_mut("fireball");
            fireball.casts = 20;
            fireball.damage = damage;
            mage.add_aura_uptime("molten_armor", Duration::from_secs(100));
            metrics.actors.push(mage);
            metrics.actors.push(ActorMetrics::new("dummy"));
            aggregate.record(&metrics);
        }

        let text = render(&aggregate);
        assert!(text.starts_with("2 iterations of 100.0s"));
        assert!(text.contains("mage: 100.0 dps"));
        assert!(text.contains("fireball"));
        assert!(text.contains("uptime molten_armor"));
        assert!(text.contains("100.0%"));
        assert!(!text.contains("dummy"));
    }
}
