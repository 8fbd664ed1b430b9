#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use room_engine::config::SimConfig;
    use room_engine::connector::Connector;
    use room_engine::coordination::{
        abf_hops, abf_hops_within, counter, follow_target, mp_collection, rectangle_walk, timed_decay,
        HOPS_INFINITY,
    };
    use room_engine::errors::{ConfigError, FieldError, InvariantError, SimError};
    use room_engine::field::{NodeContext, TagDecl};
    use room_engine::geometry::{Area, Vec3};
    use room_engine::room::{self, cell_average, gateway_collect, GatewayLogger, RoomParams};
    use room_engine::sequence::RoundSchedule;
    use room_engine::simulation::{Program, Simulator};
    use room_engine::types::{GridIndex, SatMap};

    room_engine::storage_tags! {
        Count: i64 = "count";
        Hops: i64 = "hops";
        Total: f64 = "total";
        Local: SatMap = "local";
        Collected: SatMap = "collected";
        Misordered: i64 = "misordered";
        Inside: i64 = "inside";
        Outside: i64 = "outside";
        Distance: f64 = "distance";
        Heard: i64 = "heard";
    }

    /// Lock-free periodic rounds at `t = 1, 2, ...` up to `end_time`.
    fn config_for(program: &impl Program, end_time: f64, radius: f64) -> SimConfig {
        SimConfig {
            end_time,
            tuple_store: program.tags(),
            round: RoundSchedule::periodic(1.0, 1.0),
            connector: Connector::Fixed { radius },
            area: Area::new(-20.0, -20.0, 20.0, 20.0),
            ..SimConfig::default()
        }
    }

    fn simulator<P: Program>(program: P, end_time: f64, radius: f64, positions: &[Vec3]) -> Simulator<P> {
        let config = config_for(&program, end_time, radius);
        let mut sim = Simulator::new(config, program).unwrap();
        for p in positions {
            sim.spawn_at(0.0, *p);
        }
        sim
    }

    fn line(n: usize, spacing: f64) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f64 * spacing, 0.0, 0.0)).collect()
    }

    fn grid3x3() -> Vec<Vec3> {
        (0..9).map(|i| Vec3::new((i % 3) as f64, (i / 3) as f64, 0.0)).collect()
    }

    // ========== Field Operators ==========

    struct Echo;

    impl Program for Echo {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Count>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let n = node.old(0_i64, |_, p| p + 1);
            node.set::<Count>(n)
        }
    }

    #[test]
    fn test_two_node_echo() {
        let mut sim = simulator(Echo, 10.0, 5.0, &[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)]);
        let stats = sim.run();
        assert_eq!(sim.storage::<Count>(0), Some(10));
        assert_eq!(sim.storage::<Count>(1), Some(10));
        assert_eq!(stats.rounds, 20);
        // Both see each other from the second round on.
        assert_eq!(stats.messages, 18);
    }

    struct Branching;

    impl Program for Branching {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Inside>(), TagDecl::of::<Outside>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let outside = node.nbr(1_i64).sum_hood(1);
            let left = node.uid() % 2 == 0;
            let inside = node.branch(left, |n| n.nbr(1_i64).sum_hood(1), |n| n.nbr(1_i64).sum_hood(1));
            node.set::<Outside>(outside)?;
            node.set::<Inside>(inside)
        }
    }

    #[test]
    fn test_branches_isolate_alignment() {
        let positions = line(4, 0.5);
        let mut sim = simulator(Branching, 5.0, 10.0, &positions);
        let stats = sim.run();
        for uid in 0..4 {
            assert_eq!(sim.storage::<Outside>(uid), Some(4));
            // Only the one other node with the same parity shares the arm.
            assert_eq!(sim.storage::<Inside>(uid), Some(2));
        }
        assert_eq!(stats.alignment_violations, 0);
    }

    struct RoundClockCheck;

    impl Program for RoundClockCheck {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Misordered>(), TagDecl::of::<Count>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let bad = node.old(0_i64, |n, bad| {
                let misordered = n.previous_time().is_some_and(|p| p >= n.current_time());
                bad + misordered as i64
            });
            let rounds = counter(node) as i64;
            node.set::<Misordered>(bad)?;
            node.set::<Count>(rounds)
        }
    }

    #[test]
    fn test_round_times_strictly_increase() {
        let program = RoundClockCheck;
        let mut config = config_for(&program, 50.0, 3.0);
        config.round = RoundSchedule::default();
        config.parallel = true;
        let mut sim = Simulator::new(config, program).unwrap();
        for p in grid3x3() {
            sim.spawn_at(0.0, p);
        }
        sim.run();
        for view in sim.nodes() {
            assert_eq!(sim.storage::<Misordered>(view.uid), Some(0));
            assert!(view.rounds > 40, "node {} ran {} rounds", view.uid, view.rounds);
            assert_eq!(sim.storage::<Count>(view.uid), Some(view.rounds as i64));
        }
    }

    // ========== Coordination Blocks ==========

    struct HopCount;

    impl Program for HopCount {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Hops>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let hops = abf_hops(node, node.uid() == 0);
            let stored = if hops == HOPS_INFINITY { -1 } else { hops as i64 };
            node.set::<Hops>(stored)
        }
    }

    #[test]
    fn test_three_node_hop() {
        let positions = [Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)];
        let mut sim = simulator(HopCount, 3.0, 4.0, &positions);
        sim.run();
        let hops: Vec<Option<i64>> = (0..3).map(|u| sim.storage::<Hops>(u)).collect();
        assert_eq!(hops, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_hops_match_grid_distance() {
        let mut sim = simulator(HopCount, 6.0, 1.2, &grid3x3());
        sim.run();
        for uid in 0..9_u64 {
            let manhattan = (uid % 3 + uid / 3) as i64;
            assert_eq!(sim.storage::<Hops>(uid), Some(manhattan), "node {}", uid);
        }
    }

    #[test]
    fn test_unreachable_node_reports_infinity() {
        let positions = [Vec3::ZERO, Vec3::new(15.0, 0.0, 0.0)];
        let mut sim = simulator(HopCount, 5.0, 4.0, &positions);
        sim.run();
        assert_eq!(sim.storage::<Hops>(1), Some(-1));
    }

    struct VanishingSource;

    impl Program for VanishingSource {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Hops>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let is_source = node.uid() == 0 && node.round() < 3;
            let hops = abf_hops_within(node, is_source, 5);
            let stored = if hops == HOPS_INFINITY { -1 } else { hops as i64 };
            node.set::<Hops>(stored)
        }
    }

    #[test]
    fn test_hops_fall_back_to_infinity_when_source_leaves() {
        let positions = [Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)];
        let mut sim = simulator(VanishingSource, 40.0, 4.0, &positions);
        sim.run_until(3.0);
        let hops: Vec<Option<i64>> = (0..3).map(|u| sim.storage::<Hops>(u)).collect();
        assert_eq!(hops, vec![Some(0), Some(1), Some(2)]);

        // Estimates climb past the bound within a few rounds, then stay there.
        sim.run_until(20.0);
        let hops: Vec<Option<i64>> = (0..3).map(|u| sim.storage::<Hops>(u)).collect();
        assert_eq!(hops, vec![Some(-1); 3]);
        sim.run();
        let hops: Vec<Option<i64>> = (0..3).map(|u| sim.storage::<Hops>(u)).collect();
        assert_eq!(hops, vec![Some(-1); 3]);
    }

    struct SumToSource;

    impl Program for SumToSource {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Total>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let hops = abf_hops(node, node.uid() == 0);
            let local = 1.0 + node.uid() as f64;
            let total = mp_collection(node, hops, local, 0.0, |a, b| a + b, |v, k| v / k as f64);
            node.set::<Total>(total)
        }
    }

    #[test]
    fn test_collection_conservation() {
        let mut sim = simulator(SumToSource, 30.0, 1.2, &grid3x3());
        sim.run();
        let at_source = sim.storage::<Total>(0).unwrap();
        assert!((at_source - 45.0).abs() < 1e-9, "source collected {}", at_source);
        // The far corner has no children.
        assert_eq!(sim.storage::<Total>(8), Some(9.0));
    }

    struct Decaying {
        tau: u32,
    }

    impl Program for Decaying {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Local>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let current = if node.round() == 5 {
                SatMap::single(GridIndex::new(0, 0), 0.3)
            } else {
                SatMap::new()
            };
            let kept = timed_decay(node, current, SatMap::new(), self.tau);
            node.set::<Local>(kept)
        }
    }

    #[test]
    fn test_decay_reset() {
        let tau = 4;
        let mut sim = simulator(Decaying { tau }, 30.0, 1.0, &[Vec3::ZERO]);
        // Round r fires at t = r + 1.
        let local_after = |sim: &mut Simulator<Decaying>, round: u64| {
            sim.run_until(round as f64 + 1.0);
            sim.storage::<Local>(0).unwrap_or_default()
        };
        assert!(local_after(&mut sim, 4).is_empty());
        assert_eq!(local_after(&mut sim, 5).len(), 1);
        assert_eq!(local_after(&mut sim, 5 + tau as u64).len(), 1);
        assert!(local_after(&mut sim, 5 + tau as u64 + 1).is_empty());
    }

    struct Follower;

    impl Program for Follower {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Distance>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let d = follow_target(node, Vec3::new(5.0, 0.0, 0.0), 0.5, 1.0);
            node.set::<Distance>(d)
        }
    }

    #[test]
    fn test_follow_target_reports_distance_and_stops() {
        let mut sim = simulator(Follower, 20.0, 1.0, &[Vec3::ZERO]);
        // One unit per round: at t = 3 the node has covered two units.
        sim.run_until(3.0);
        let d = sim.storage::<Distance>(0).unwrap();
        assert!((d - 3.0).abs() < 1e-9, "distance {}", d);

        sim.run();
        let view = sim.node(0).unwrap();
        assert!(sim.storage::<Distance>(0).unwrap() <= 0.5);
        assert!((view.position.x - 5.0).abs() < 0.5, "stopped at {:?}", view.position);
        assert_eq!(view.velocity, Vec3::ZERO);
    }

    struct Walker;

    const WALK_LOW: Vec3 = Vec3::new(10.0, 10.0, 0.0);
    const WALK_HIGH: Vec3 = Vec3::new(16.0, 16.0, 0.0);

    impl Program for Walker {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Distance>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let d = rectangle_walk(node, WALK_LOW, WALK_HIGH, 0.5, 1.0);
            node.set::<Distance>(d)
        }
    }

    #[test]
    fn test_rectangle_walk_keeps_retargeting_inside_box() {
        let mut sim = simulator(Walker, 200.0, 1.0, &[Vec3::ZERO]);
        // A final step may carry the walker up to `reach` past a target.
        let slack = 0.5;
        let inside = |p: &Vec3| {
            (WALK_LOW.x - slack..=WALK_HIGH.x + slack).contains(&p.x)
                && (WALK_LOW.y - slack..=WALK_HIGH.y + slack).contains(&p.y)
        };
        // The first target is at most ~23 units away.
        sim.run_until(40.0);

        let mut visited = Vec::new();
        for t in (50..=200).step_by(10) {
            sim.run_until(t as f64);
            let view = sim.node(0).unwrap();
            assert!(inside(&view.position), "left the box at t = {}: {:?}", t, view.position);
            let d = sim.storage::<Distance>(0).unwrap();
            assert!(d <= (WALK_HIGH - WALK_LOW).norm() + 2.0 * slack);
            visited.push(view.position);
        }
        // A walker that never drew a fresh target would be parked.
        let spread = visited
            .iter()
            .flat_map(|a| visited.iter().map(move |b| (*a - *b).norm()))
            .fold(0.0, f64::max);
        assert!(spread > 2.0, "walker stayed within {}", spread);
    }

    // ========== Room Building Blocks ==========

    struct Reporters;

    impl Program for Reporters {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Local>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let s = [0.2, 0.4, 0.6][node.uid() as usize];
            let cell = GridIndex::from_position(&node.position(), 10.0, 10, 3);
            let local = cell_average(node, Some((cell, s)));
            node.set::<Local>(local)
        }
    }

    #[test]
    fn test_reporter_single_cell_average() {
        let here = Vec3::new(1.0, 1.0, 0.0);
        let mut sim = simulator(Reporters, 2.0, 10.0, &[here, here, here]);
        sim.run();
        for uid in 0..3 {
            let map = sim.storage::<Local>(uid).unwrap();
            assert_eq!(map.len(), 1);
            let v = map.get(&GridIndex::new(0, 0)).unwrap();
            assert!((v - 0.4).abs() < 1e-12, "node {} averaged {}", uid, v);
        }
    }

    struct LineToGateway;

    impl Program for LineToGateway {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Collected>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let uid = node.uid();
            let local = if uid == 0 {
                SatMap::new()
            } else {
                SatMap::single(GridIndex::new(uid as u32, 0), uid as f64 / 10.0)
            };
            let map = gateway_collect(node, local, uid == 0, 10);
            node.set::<Collected>(map)
        }
    }

    #[test]
    fn test_map_collection_to_gateway() {
        // Hops settle within the diameter, payloads need as many rounds again.
        let mut sim = simulator(LineToGateway, 2.0 * 9.0 + 4.0, 1.5, &line(10, 1.0));
        sim.run();
        let map = sim.storage::<Collected>(0).unwrap();
        assert_eq!(map.len(), 9);
        for uid in 1..10_u32 {
            assert_eq!(map.get(&GridIndex::new(uid, 0)), Some(uid as f64 / 10.0));
        }
    }

    // ========== Scheduling and Connectivity ==========

    struct Listener;

    impl Program for Listener {
        fn tags(&self) -> Vec<TagDecl> {
            vec![TagDecl::of::<Heard>(), TagDecl::of::<Count>()]
        }

        fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
            let n = node.neighbor_count() as i64;
            let heard = node.old(0_i64, |_, total| total + n);
            let rounds = counter(node) as i64;
            node.set::<Heard>(heard)?;
            node.set::<Count>(rounds)
        }
    }

    fn cluster() -> Vec<Vec3> {
        vec![
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ]
    }

    fn listener_run(synchronised: bool, connector: Connector, seed: u64) -> Simulator<Listener> {
        let mut config = config_for(&Listener, 100.0, 10.0);
        config.seed = seed;
        config.connector = connector;
        config.synchronised = synchronised;
        config.parallel = true;
        if synchronised {
            config.round = RoundSchedule::default();
        }
        let mut sim = Simulator::new(config, Listener).unwrap();
        for p in cluster() {
            sim.spawn_at(0.0, p);
        }
        sim.run();
        sim
    }

    #[test]
    fn test_synchronised_nodes_fire_in_lock_step() {
        let sim = listener_run(true, Connector::Fixed { radius: 10.0 }, 5);
        let views = sim.nodes();
        let first = &views[0];
        assert!(first.rounds > 80);
        for view in &views {
            assert_eq!(view.current_time, first.current_time);
            assert_eq!(view.rounds, first.rounds);
        }
        assert_eq!(sim.stats().rounds, 4 * first.rounds);
        // Every round after the first hears all three others.
        assert_eq!(sim.storage::<Heard>(0), Some(3 * (first.rounds as i64 - 1)));
    }

    #[test]
    fn test_unsynchronised_nodes_drift_apart() {
        let mut config = config_for(&Listener, 50.0, 10.0);
        config.round = RoundSchedule::default();
        let mut sim = Simulator::new(config, Listener).unwrap();
        for p in cluster() {
            sim.spawn_at(0.0, p);
        }
        sim.run();
        let views = sim.nodes();
        assert!(views.iter().any(|v| v.current_time != views[0].current_time));
    }

    #[test]
    fn test_radial_connector_drops_links_per_receiver() {
        let lossless = listener_run(false, Connector::Fixed { radius: 10.0 }, 9);
        let in_range = lossless.stats().messages;
        // 99 rounds after the first, three senders per receiver.
        assert_eq!(in_range, 99 * 4 * 3);
        assert_eq!(lossless.stats().dropped_links, 0);

        let lossy = listener_run(false, Connector::Radial { percent: 50, radius: 10.0 }, 9);
        let stats = lossy.stats();
        assert_eq!(stats.messages + stats.dropped_links, in_range);
        let kept = stats.messages as f64 / in_range as f64;
        assert!((0.4..0.6).contains(&kept), "kept {} of links", kept);
        let heard: i64 = (0..4).filter_map(|u| lossy.storage::<Heard>(u)).sum();
        assert_eq!(heard as u64, stats.messages);

        let again = listener_run(false, Connector::Radial { percent: 50, radius: 10.0 }, 9);
        assert_eq!(again.stats(), stats);
        assert_eq!(again.nodes(), lossy.nodes());

        let silent = listener_run(false, Connector::Radial { percent: 0, radius: 10.0 }, 9);
        assert_eq!(silent.stats().messages, 0);
        assert_eq!(silent.stats().dropped_links, in_range);
    }

    // ========== Configuration Errors ==========

    #[test]
    fn test_undeclared_tag_fails_at_startup() {
        let mut config = config_for(&Echo, 5.0, 1.0);
        config.tuple_store.clear();
        let err = Simulator::new(config, Echo).err();
        assert!(matches!(err, Some(SimError::Config(ConfigError::UndeclaredTag(t))) if t == "count"));
    }

    #[test]
    fn test_bad_transition_row_is_fatal() {
        let mut params = RoomParams::canonical();
        params.transitions.rows[0] = [95, 1, 4, 0, 1];
        let config = params.sim_config(1, false);
        let err = room::build(params, config).err();
        assert!(matches!(
            err,
            Some(SimError::Invariant(InvariantError::RowSum { state: 0, sum: 101 }))
        ));
    }

    // ========== Room Scenario ==========

    fn small_room(seed: u64, parallel: bool) -> Simulator<room::RoomProgram> {
        let params = RoomParams {
            people: 30,
            end_time: 40.0,
            ..RoomParams::canonical()
        };
        let config = params.sim_config(seed, parallel);
        room::build(params, config).unwrap()
    }

    #[test]
    fn test_runs_are_deterministic() {
        let mut a = small_room(7, false);
        let mut b = small_room(7, false);
        let mut c = small_room(7, true);
        for t in [5.0, 17.5, 40.0] {
            a.run_until(t);
            b.run_until(t);
            c.run_until(t);
            assert_eq!(a.nodes(), b.nodes(), "sequential runs diverged by t = {}", t);
            assert_eq!(a.nodes(), c.nodes(), "parallel run diverged by t = {}", t);
        }
        assert_eq!(a.stats(), c.stats());
    }

    #[test]
    fn test_seeds_change_the_run() {
        let mut a = small_room(1, false);
        let mut b = small_room(2, false);
        a.run();
        b.run();
        assert_ne!(a.nodes(), b.nodes());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.0.lock() {
                Ok(mut inner) => inner.write(buf),
                Err(_) => Err(io::Error::new(io::ErrorKind::Other, "poisoned")),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_room_prints_gateway_map_every_second() {
        let mut sim = small_room(3, true);
        let params = sim.program().params().clone();
        let out = SharedBuf::default();
        sim.add_aggregator(GatewayLogger::new(out.clone(), &params));
        let stats = sim.run();

        assert_eq!(stats.nodes, 30);
        assert_eq!(stats.failed_rounds, 0);
        assert_eq!(stats.alignment_violations, 0);
        assert_eq!(stats.log_ticks, 41);

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 41 * (1 + params.map_y_size() as usize));
        assert_eq!(lines[0], "T = 0");
        assert_eq!(lines[1].split('\t').count(), params.map_x_size() as usize);

        for view in sim.nodes() {
            let area = params.area();
            assert!(area.contains(&view.position), "node {} left the room", view.uid);
        }
    }
}
