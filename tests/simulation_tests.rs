#[cfg(test)]
mod tests {
    use cluster_mesh_engine::routing::{is_converged, shortest_costs};
    use cluster_mesh_engine::*;

    struct TwoClusters {
        sim: NetworkSimulation,
        a: ClusterId,
        b: ClusterId,
        ga: NodeId,
        gb: NodeId,
        na: NodeId,
        link: LinkId,
    }

    /// A = {gA, nA}, B = {gB, nB}, gA <-> gB.
    fn two_clusters(seed: u64) -> TwoClusters {
        let mut sim = NetworkSimulation::from_seed(seed);
        let a = sim.create_cluster("A").unwrap();
        let b = sim.create_cluster("B").unwrap();
        let ga = sim.create_node(a, "gA", true).unwrap();
        let na = sim.create_node(a, "nA", false).unwrap();
        let gb = sim.create_node(b, "gB", true).unwrap();
        sim.create_node(b, "nB", false).unwrap();
        let link = sim.create_gateway_link(ga, gb).unwrap();
        TwoClusters { sim, a, b, ga, gb, na, link }
    }

    /// One gateway per cluster, `g0..g{n-1}`, linked in a chain.
    fn line(sim: &mut NetworkSimulation, n: usize) -> (Vec<ClusterId>, Vec<NodeId>, Vec<LinkId>) {
        let mut clusters = Vec::new();
        let mut gateways = Vec::new();
        let mut links = Vec::new();
        for i in 0..n {
            let c = sim.create_cluster(&format!("C{i}")).unwrap();
            clusters.push(c);
            gateways.push(sim.create_node(c, &format!("g{i}"), true).unwrap());
        }
        for pair in gateways.windows(2) {
            links.push(sim.create_gateway_link(pair[0], pair[1]).unwrap());
        }
        (clusters, gateways, links)
    }

    fn run_until_terminal(sim: &mut NetworkSimulation, id: MessageId, max_ticks: u32) {
        for _ in 0..max_ticks {
            if sim.message(id).map_or(true, |m| m.status.is_terminal()) {
                return;
            }
            sim.tick_core();
        }
    }

    fn assert_sound(sim: &NetworkSimulation) {
        let violations = sim.topology().integrity_violations();
        assert!(violations.is_empty(), "integrity broken: {violations:?}");
    }

    // ========== Two-Cluster Scenario ==========

    #[test]
    fn test_two_cluster_discovery_and_routes_after_first_tick() {
        let mut w = two_clusters(1);
        w.sim.tick_core();

        let na = w.sim.topology().node(w.na).unwrap();
        let table = na.local_gateways().unwrap();
        assert!(table.contains("gA"), "nA should hear gA on tick 1");
        assert!(!table.contains("gB"), "announcements never cross clusters");

        let route = w.sim.topology().node(w.ga).unwrap().routing_table().unwrap().get(w.b).cloned();
        let route = route.expect("gA should learn B after one exchange");
        assert_eq!(route.next_hop, "gB");
        assert_eq!(route.next_hop_cluster, w.b);
        assert_eq!(route.cost, 1);
    }

    #[test]
    fn test_two_cluster_message_delivered_in_three_hops() {
        let mut w = two_clusters(1);
        w.sim.tick_core();

        let id = w.sim.send_message(w.a, "nA", w.b, "nB", "hello").unwrap();
        run_until_terminal(&mut w.sim, id, 10);

        let msg = w.sim.message(id).unwrap();
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.trace, vec!["nA", "gA", "gB"]);
        assert_eq!(msg.hops, 3);
        assert_eq!(msg.ttl, 7);
        assert_eq!(msg.payload, "hello");
        let dest = w.sim.node_named(w.b, "nB").unwrap().id;
        assert_eq!(msg.location, dest);
    }

    #[test]
    fn test_nonexistent_destination_dropped_on_first_tick() {
        let mut w = two_clusters(1);
        w.sim.tick_core();

        let id = w.sim.send_message(w.a, "nA", w.b, "ghost", "lost").unwrap();
        let result = w.sim.tick_core();

        assert_eq!(result.forwarding.dropped, vec![(id, DropReason::DestinationUnknown)]);
        let msg = w.sim.message(id).unwrap();
        assert_eq!(msg.status, MessageStatus::Dropped);
        assert!(msg.trace.len() <= 1, "trace was {:?}", msg.trace);
    }

    #[test]
    fn test_send_rejects_unknown_source_only() {
        let mut w = two_clusters(1);
        let err = w.sim.send_message(w.a, "nobody", w.b, "nB", "x");
        assert!(matches!(err, Err(CommandError::UnknownNodeName { .. })));
        // Destination is resolved by forwarding, not at send time.
        assert!(w.sim.send_message(w.a, "nA", ClusterId(77), "nB", "x").is_ok());
    }

    // ========== Forwarding Properties ==========

    #[test]
    fn test_ttl_one_two_hop_message_never_delivered() {
        for seed in 0..10 {
            let mut w = two_clusters(seed);
            w.sim.tick_core();

            // nA -> gA -> gB
            let request = MessageRequest::new(w.a, "nA", w.b, "gB", "short fuse").with_ttl(1);
            let id = w.sim.send(request).unwrap();
            run_until_terminal(&mut w.sim, id, 10);

            let msg = w.sim.message(id).unwrap();
            assert_eq!(msg.status, MessageStatus::Dropped, "seed {seed} delivered with ttl 1");
            assert_eq!(msg.drop_reason, Some(DropReason::TtlExpired));
        }
    }

    #[test]
    fn test_gateway_origin_path_independent_of_seed() {
        let traces: Vec<Vec<String>> = [3u64, 41, 999]
            .iter()
            .map(|&seed| {
                let mut sim = NetworkSimulation::from_seed(seed);
                let (clusters, _, _) = line(&mut sim, 4);
                sim.run_batch(5);
                let id = sim.send_message(clusters[0], "g0", clusters[3], "g3", "x").unwrap();
                run_until_terminal(&mut sim, id, 10);
                let msg = sim.message(id).unwrap();
                assert_eq!(msg.status, MessageStatus::Delivered);
                msg.trace.clone()
            })
            .collect();

        assert_eq!(traces[0], vec!["g0", "g1", "g2", "g3"]);
        assert!(traces.iter().all(|t| *t == traces[0]));
    }

    #[test]
    fn test_same_seed_reproduces_history() {
        let run = |seed: u64| {
            let mut sim = NetworkSimulation::from_seed(seed);
            let a = sim.create_cluster("A").unwrap();
            let b = sim.create_cluster("B").unwrap();
            let g1 = sim.create_node(a, "g1", true).unwrap();
            let g2 = sim.create_node(a, "g2", true).unwrap();
            let gb = sim.create_node(b, "gB", true).unwrap();
            sim.create_node(a, "n", false).unwrap();
            sim.create_node(b, "m", false).unwrap();
            sim.create_gateway_link(g1, gb).unwrap();
            sim.create_gateway_link(g2, gb).unwrap();
            sim.tick_core();
            for _ in 0..20 {
                sim.send_message(a, "n", b, "m", "x").unwrap();
            }
            sim.tick_core();
            let snapshot = serde_json::to_string(&sim.snapshot()).unwrap();
            let log: Vec<String> = sim.log_since(0).into_iter().map(|e| e.message).collect();
            (snapshot, log)
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_destination_deleted_mid_flight_drops() {
        let mut w = two_clusters(1);
        w.sim.tick_core();
        let id = w.sim.send_message(w.a, "nA", w.b, "nB", "x").unwrap();
        w.sim.tick_core();

        let nb = w.sim.node_named(w.b, "nB").unwrap().id;
        w.sim.delete_node(nb).unwrap();
        w.sim.tick_core();

        let msg = w.sim.message(id).unwrap();
        assert_eq!(msg.drop_reason, Some(DropReason::DestinationUnknown));
    }

    // ========== Topology Commands ==========

    #[test]
    fn test_add_node_into_missing_cluster_rejected_and_logged() {
        let mut sim = NetworkSimulation::from_seed(0);
        let before = sim.log().count(LogCategory::Rejected);
        let err = sim.create_node(ClusterId(42), "orphan", false);

        assert_eq!(err, Err(CommandError::UnknownCluster(ClusterId(42))));
        assert_eq!(sim.topology().node_count(), 0);
        assert_eq!(sim.log().count(LogCategory::Rejected), before + 1);
    }

    #[test]
    fn test_same_cluster_and_duplicate_links_rejected() {
        let mut w = two_clusters(1);
        let ga2 = w.sim.create_node(w.a, "gA2", true).unwrap();

        assert_eq!(
            w.sim.create_gateway_link(w.ga, ga2),
            Err(CommandError::SameCluster(w.ga, ga2))
        );
        assert!(matches!(
            w.sim.create_gateway_link(w.gb, w.ga),
            Err(CommandError::DuplicateLink(..))
        ));
        assert!(matches!(
            w.sim.create_gateway_link(w.na, w.gb),
            Err(CommandError::NotAGateway(_))
        ));
        assert_eq!(w.sim.topology().link_count(), 1);
        assert_eq!(w.sim.log().count(LogCategory::Rejected), 3);
    }

    #[test]
    fn test_integrity_holds_through_cascading_deletes() {
        let mut sim = NetworkSimulation::from_seed(9);
        // 3x3 grid of clusters, one gateway and one standard node each
        let mut gateways = Vec::new();
        let mut clusters = Vec::new();
        for i in 0..9 {
            let c = sim.create_cluster(&format!("C{i}")).unwrap();
            sim.create_node(c, &format!("n{i}"), false).unwrap();
            gateways.push(sim.create_node(c, &format!("g{i}"), true).unwrap());
            clusters.push(c);
        }
        let mut links = Vec::new();
        for i in 0..9 {
            if i % 3 < 2 {
                links.push(sim.create_gateway_link(gateways[i], gateways[i + 1]).unwrap());
            }
            if i < 6 {
                links.push(sim.create_gateway_link(gateways[i], gateways[i + 3]).unwrap());
            }
        }
        sim.run_batch(6);
        assert!(is_converged(sim.topology()));
        for i in 0..9 {
            sim.send_message(clusters[i], &format!("n{i}"), clusters[8 - i], &format!("n{}", 8 - i), "x")
                .unwrap();
        }
        sim.tick_core();

        sim.delete_gateway_link(links[0]).unwrap();
        assert_sound(&sim);
        sim.tick_core();
        sim.delete_node(gateways[4]).unwrap();
        assert_sound(&sim);
        sim.tick_core();
        sim.delete_cluster(clusters[2]).unwrap();
        assert_sound(&sim);
        assert!(sim.topology().nodes().all(|n| n.cluster != clusters[2]));
        assert!(sim
            .topology()
            .gateways()
            .filter_map(|g| g.routing_table())
            .all(|t| !t.contains(clusters[2])));

        sim.run_batch(10);
        assert_sound(&sim);
    }

    // ========== GDP ==========

    #[test]
    fn test_new_gateway_discovered_on_next_tick() {
        let mut w = two_clusters(1);
        w.sim.run_batch(3);
        w.sim.create_node(w.a, "gA2", true).unwrap();
        let table = w.sim.topology().node(w.na).unwrap().local_gateways().unwrap();
        assert!(!table.contains("gA2"), "nothing is heard between ticks");

        let result = w.sim.tick_core();
        assert_eq!(result.discovery.discovered, 1);
        let table = w.sim.topology().node(w.na).unwrap().local_gateways().unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["gA", "gA2"]);
        assert_eq!(result.discovery.expired, 0);
    }

    #[test]
    fn test_deleted_gateway_never_chosen_as_first_hop() {
        // A = {gA1, gA2, nA}, B = {gB, nB}, both A gateways linked to gB.
        let mut sim = NetworkSimulation::from_seed(3);
        let a = sim.create_cluster("A").unwrap();
        let b = sim.create_cluster("B").unwrap();
        let ga1 = sim.create_node(a, "gA1", true).unwrap();
        let ga2 = sim.create_node(a, "gA2", true).unwrap();
        let na = sim.create_node(a, "nA", false).unwrap();
        let gb = sim.create_node(b, "gB", true).unwrap();
        sim.create_node(b, "nB", false).unwrap();
        sim.create_gateway_link(ga1, gb).unwrap();
        sim.create_gateway_link(ga2, gb).unwrap();
        sim.tick_core();

        sim.delete_node(ga1).unwrap();
        let table = sim.topology().node(na).unwrap().local_gateways().unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["gA2"]);
        assert_sound(&sim);

        let ids: Vec<MessageId> =
            (0..40).map(|i| sim.send_message(a, "nA", b, "nB", &format!("m{i}")).unwrap()).collect();
        sim.run_batch(3);
        for id in ids {
            let m = sim.message(id).unwrap();
            assert_eq!(m.status, MessageStatus::Delivered, "{id} ended as {:?}", m.drop_reason);
            assert_eq!(m.trace, vec!["nA", "gA2", "gB"]);
        }
    }

    // ========== ICRP ==========

    #[test]
    fn test_ring_converges_to_hop_distance() {
        let mut sim = NetworkSimulation::from_seed(0);
        let (clusters, gateways, _) = line(&mut sim, 6);
        sim.create_gateway_link(gateways[5], gateways[0]).unwrap();
        sim.run_batch(10);

        assert!(is_converged(sim.topology()));
        for &g in &gateways {
            let table = sim.topology().node(g).unwrap().routing_table().unwrap();
            assert_eq!(table.len(), clusters.len());
            for (dest, cost) in shortest_costs(sim.topology(), g) {
                assert_eq!(table.get(dest).map(|r| r.cost), Some(cost));
            }
        }
        let g0 = sim.topology().node(gateways[0]).unwrap().routing_table().unwrap();
        assert_eq!(g0.get(clusters[3]).map(|r| r.cost), Some(3));
    }

    #[test]
    fn test_link_delete_withdraws_routes_then_relearns_longer_path() {
        let mut sim = NetworkSimulation::from_seed(0);
        let (clusters, gateways, links) = line(&mut sim, 3);
        sim.create_gateway_link(gateways[2], gateways[0]).unwrap();
        sim.run_batch(4);
        let route = |sim: &NetworkSimulation| {
            sim.topology().node(gateways[0]).unwrap().routing_table().unwrap().get(clusters[1]).cloned()
        };
        assert_eq!(route(&sim).map(|r| r.cost), Some(1));

        sim.delete_gateway_link(links[0]).unwrap();
        assert_eq!(route(&sim), None, "route through deleted link must go at once");

        sim.tick_core();
        let relearned = route(&sim).expect("longer path via g2");
        assert_eq!(relearned.cost, 2);
        assert_eq!(relearned.next_hop, "g2");
        sim.run_batch(3);
        assert!(is_converged(sim.topology()));
    }

    #[test]
    fn test_partition_count_to_infinity_is_a_known_limitation() {
        let mut sim = NetworkSimulation::from_seed(0);
        let (clusters, gateways, links) = line(&mut sim, 3);
        sim.run_batch(3);
        sim.delete_gateway_link(links[1]).unwrap();
        sim.run_batch(20);

        // C is unreachable, yet A keeps a route whose cost keeps climbing.
        let route = sim.topology().node(gateways[0]).unwrap().routing_table().unwrap().get(clusters[2]);
        assert!(route.is_some_and(|r| r.cost > 2));
        assert!(!is_converged(sim.topology()));
    }

    #[test]
    fn test_cost_ceiling_flushes_unreachable_cluster() {
        let config = SimConfig { route_cost_ceiling: Some(16), ..SimConfig::default() };
        let mut sim = NetworkSimulation::with_config(config).unwrap();
        let (clusters, gateways, links) = line(&mut sim, 3);
        sim.run_batch(3);
        sim.delete_gateway_link(links[1]).unwrap();
        sim.run_batch(30);

        for &g in &gateways[..2] {
            let table = sim.topology().node(g).unwrap().routing_table().unwrap();
            assert!(!table.contains(clusters[2]), "{g} still routes to the lost cluster");
        }
        assert!(is_converged(sim.topology()));
    }

    // ========== Clock & Commands ==========

    #[test]
    fn test_messages_survive_stop_start_with_ttl() {
        let mut w = two_clusters(1);
        w.sim.tick_core();
        let id = w.sim.send_message(w.a, "nA", w.b, "nB", "x").unwrap();

        assert!(w.sim.start());
        assert_eq!(w.sim.advance(1000.0).len(), 1);
        let before = w.sim.message(id).cloned().unwrap();
        assert_eq!(before.location, w.ga);

        assert!(w.sim.stop());
        assert!(w.sim.advance(10_000.0).is_empty());
        assert_eq!(w.sim.message(id), Some(&before));

        assert!(w.sim.start());
        w.sim.advance(1000.0);
        w.sim.advance(1000.0);
        let msg = w.sim.message(id).unwrap();
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.ttl, 7);
    }

    #[test]
    fn test_redundant_start_stop_logged_as_noop() {
        let mut sim = NetworkSimulation::from_seed(0);
        assert!(!sim.stop());
        assert!(sim.start());
        assert!(!sim.start());
        assert_eq!(sim.log().count(LogCategory::Clock), 3);
        assert_eq!(sim.log().count(LogCategory::Rejected), 0);
    }

    #[test]
    fn test_tick_period_bounds_and_effect() {
        let mut sim = NetworkSimulation::from_seed(0);
        assert!(matches!(
            sim.set_tick_period(50),
            Err(CommandError::PeriodOutOfRange { period_ms: 50, .. })
        ));
        assert_eq!(sim.log().last().map(|e| e.category), Some(LogCategory::Rejected));

        sim.set_tick_period(500).unwrap();
        let result = sim.tick_core();
        assert_eq!(result.time_ms, 500);
        assert_eq!(sim.tick_period_ms(), 500);
    }

    #[test]
    fn test_submitted_commands_wait_for_next_tick() {
        let mut w = two_clusters(1);
        w.sim.submit(Command::DeleteGatewayLink { id: w.link });
        w.sim.submit(Command::CreateNode { cluster: ClusterId(99), name: "x".into(), is_gateway: false });
        assert_eq!(w.sim.topology().link_count(), 1);

        let result = w.sim.tick_core();
        assert_eq!(result.applied_commands, 1, "bad command is rejected, not applied");
        assert_eq!(w.sim.topology().link_count(), 0);
        assert_eq!(result.exchange.exchanges, 0);
    }

    #[test]
    fn test_queued_stop_halts_remaining_due_ticks() {
        let mut w = two_clusters(1);
        assert!(w.sim.start());
        w.sim.submit(Command::Stop);

        let results = w.sim.advance(3000.0);
        assert_eq!(results.len(), 1, "only the tick that drained the stop may run");
        assert_eq!(results[0].applied_commands, 1);
        assert!(!w.sim.is_running());
        assert_eq!(w.sim.now().tick, 1);

        assert!(w.sim.advance(3000.0).is_empty());
        assert!(w.sim.start());
        assert_eq!(w.sim.advance(2000.0).len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig { tick_period_ms: 5000, ..SimConfig::default() };
        assert!(matches!(
            NetworkSimulation::with_config(config),
            Err(ConfigError::PeriodOutOfRange { .. })
        ));
        assert!(matches!(SimConfig::from_json("{"), Err(ConfigError::Parse(_))));
        let partial = SimConfig::from_json(r#"{"rng_seed": 7, "initial_ttl": 4}"#).unwrap();
        assert_eq!(partial.initial_ttl, 4);
        assert_eq!(partial.tick_period_ms, 1000);
    }

    #[test]
    fn test_reset_keeps_config_and_clears_world() {
        let config = SimConfig { tick_period_ms: 250, initial_ttl: 4, ..SimConfig::with_seed(9) };
        let mut sim = NetworkSimulation::with_config(config.clone()).unwrap();
        let a = sim.create_cluster("A").unwrap();
        sim.create_node(a, "nA", false).unwrap();
        sim.submit(Command::Start);
        sim.run_batch(3);

        sim.reset();
        assert_eq!(sim.config(), &config);
        assert_eq!(sim.tick_period_ms(), 250);
        assert_eq!(sim.now().tick, 0);
        assert!(!sim.is_running());
        assert_eq!(sim.topology().cluster_count(), 0);
        assert_eq!(sim.next_log_seq(), 0);
        assert_eq!(sim.pending_commands().count(), 0);
    }

    #[test]
    fn test_log_streams_incrementally() {
        let mut w = two_clusters(1);
        let cursor = w.sim.log().next_seq();
        w.sim.tick_core();
        let fresh = w.sim.log_since(cursor);
        assert!(!fresh.is_empty());
        assert!(fresh.iter().all(|e| e.seq >= cursor && e.tick == 1));
        assert!(fresh.iter().any(|e| e.category == LogCategory::Discovery));
        assert!(fresh.iter().any(|e| e.category == LogCategory::Routing));
    }

    #[test]
    fn test_snapshot_reflects_world() {
        let mut w = two_clusters(1);
        w.sim.tick_core();
        w.sim.send_message(w.a, "nA", w.b, "nB", "x").unwrap();
        let snap = w.sim.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.clusters.len(), 2);
        assert_eq!(snap.nodes.len(), 4);
        assert_eq!(snap.links.len(), 1);
        assert_eq!(snap.messages.len(), 1);
        assert!(!snap.running);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["nodes"][0]["state"]["role"], "gateway");
    }

    #[test]
    fn test_terminal_message_leaves_snapshot_after_grace() {
        let mut w = two_clusters(1);
        let id = w.sim.send_message(w.a, "nA", w.a, "nA", "self").unwrap();
        w.sim.tick_core();
        assert_eq!(w.sim.message(id).unwrap().status, MessageStatus::Delivered);
        w.sim.run_batch(2);
        assert!(w.sim.message(id).is_none());
        assert!(w.sim.snapshot().messages.is_empty());
    }
}
