use crate::insights::{Effort, Optimization, Phase, Roadmap};

/// Most optimizations a phase after quick wins may hold.
pub const PHASE_SIZE: usize = 5;

const QUICK_WIN_MAX_PRIORITY: u8 = 2;

fn is_quick_win(optimization: &Optimization) -> bool {
    optimization.priority <= QUICK_WIN_MAX_PRIORITY && optimization.effort != Effort::High
}

/// Orders optimizations and buckets them into implementation phases.
///
/// Quick wins form phase 1; the rest follow in priority order from phase 2 on,
/// at most `PHASE_SIZE` per phase. Empty phases are never emitted, so a roadmap
/// without quick wins starts at phase 2.
pub fn build_roadmap(optimizations: &[Optimization]) -> Roadmap {
    let mut ordered: Vec<&Optimization> = optimizations.iter().collect();
    ordered.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.effort.cmp(&b.effort))
            .then_with(|| a.id.cmp(&b.id))
    });

    let (quick_wins, remaining): (Vec<&Optimization>, Vec<&Optimization>) =
        ordered.into_iter().partition(|o| is_quick_win(o));

    let mut phases = Vec::new();
    if !quick_wins.is_empty() {
        phases.push(Phase {
            number: 1,
            name: "Quick Wins".to_string(),
            quick_wins: true,
            optimization_ids: quick_wins.iter().map(|o| o.id.clone()).collect(),
        });
    }

    for (index, chunk) in remaining.chunks(PHASE_SIZE).enumerate() {
        let number = index + 2;
        let top_priority = chunk.iter().map(|o| o.priority).min().unwrap_or_default();
        phases.push(Phase {
            number,
            name: format!("Phase {number}: {}", priority_label(top_priority)),
            quick_wins: false,
            optimization_ids: chunk.iter().map(|o| o.id.clone()).collect(),
        });
    }

    Roadmap { phases }
}

fn priority_label(priority: u8) -> &'static str {
    match priority {
        0..=1 => "Critical Improvements",
        2 => "High-Impact Improvements",
        3 => "Planned Improvements",
        _ => "Long-Term Improvements",
    }
}
