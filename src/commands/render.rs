use dronegrid::{
    Cell, CrashKind, Event, Occupant, RunStats, TargetCells, TickResult,
    WorldSnapshot,
};

/// Draws the committed board, row 0 at the top.
///
/// `X` obstacle, `#` uncovered target, `@` drone on a target, `o` any other
/// drone, `.` empty.
pub fn render_board(snapshot: &WorldSnapshot, targets: &TargetCells) -> String {
    let dims = snapshot.dims();
    let mut rows = Vec::with_capacity(dims.height.max(0) as usize);
    for y in 0..dims.height {
        let row: String = (0..dims.width)
            .map(|x| {
                let cell = Cell::new(x, y);
                match (snapshot.occupant(cell), targets.covers(cell)) {
                    (Some(Occupant::Obstacle), _) => 'X',
                    (Some(Occupant::Agent(_)), true) => '@',
                    (Some(Occupant::Agent(_)), false) => 'o',
                    (None, true) => '#',
                    (None, false) => '.',
                }
            })
            .collect();
        rows.push(row);
    }
    rows.join("\n")
}

pub fn print_tick(result: &TickResult) {
    let population = result
        .events
        .iter()
        .rev()
        .find_map(|e| match e {
            Event::TickCompleted { population, .. } => Some(*population),
            _ => None,
        })
        .unwrap_or(0);
    println!(
        "Tick {}: {} events | drones={}",
        result.tick,
        result.events.len(),
        population
    );
    for event in &result.events {
        if let Some(line) = describe_event(event) {
            println!(" - {}", line);
        }
    }
}

fn describe_event(event: &Event) -> Option<String> {
    let line = match event {
        Event::AgentSpawned {
            agent_id,
            cell,
            attempts,
        } => format!("drone #{} spawned at {} ({} attempt(s))", agent_id, cell, attempts),
        Event::PlacementFailed {
            next_id, attempts, ..
        } => format!(
            "could not place drone #{} after {} attempt(s)",
            next_id, attempts
        ),
        Event::AgentCrashed {
            agent_id,
            cell,
            kind: CrashKind::Collision,
            other,
        } => match other {
            Some(winner) => format!("drone #{} lost {} to drone #{}", agent_id, cell, winner),
            None => format!("drone #{} collided at {}", agent_id, cell),
        },
        Event::AgentCrashed {
            agent_id,
            cell,
            kind,
            ..
        } => format!("drone #{} crashed ({}) at {}", agent_id, kind.label(), cell),
        Event::AgentCulled { agent_id, cell } => {
            format!("drone #{} culled at {}", agent_id, cell)
        }
        Event::TickStarted { .. } | Event::AgentMoved { .. } | Event::TickCompleted { .. } => {
            return None;
        }
    };
    Some(line)
}

pub fn print_summary(stats: &RunStats, live: usize, target: usize) {
    println!(
        "Run summary: ticks={} | drones={}/{} | spawned={} | placement_failures={}",
        stats.ticks, live, target, stats.spawned, stats.placement_failures
    );
    println!(
        "Crashes: obstacle={} | out_of_bounds={} | collision={} | culled={}",
        stats.obstacle_crashes, stats.out_of_bounds_crashes, stats.collisions, stats.culled
    );
    match serde_toon::to_string_pretty(stats) {
        Ok(toon) => tracing::debug!("run stats\n{}", toon),
        Err(err) => tracing::debug!(error = %err, "could not format run stats"),
    }
}
