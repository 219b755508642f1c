//! End-to-end searches over in-memory adjacency graphs, including
//! spill-forced runs under a tiny memory budget.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use bidipath::frontier::TableOptions;
use bidipath::scan::{AdjacencyGraph, AdjacencyScanner};
use bidipath::search::{PathRow, PathSearch, SearchOptions, SearchParams};
use bidipath::types::{CancelToken, Result, SearchError, VertexId};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn v(local: u64) -> VertexId {
    VertexId::new(0, local)
}

fn diamond() -> Arc<AdjacencyGraph> {
    let mut g = AdjacencyGraph::new();
    g.add_edge(v(1), v(2));
    g.add_edge(v(2), v(3));
    g.add_edge(v(1), v(4));
    g.add_edge(v(4), v(3));
    Arc::new(g)
}

fn run(
    graph: &Arc<AdjacencyGraph>,
    params: SearchParams,
    options: SearchOptions,
) -> Result<Vec<PathRow>> {
    let search = PathSearch::new(
        params,
        options,
        Box::new(AdjacencyScanner::new(graph.clone())),
        Box::new(AdjacencyScanner::new(graph.clone())),
        CancelToken::none(),
    )?;
    search.collect()
}

fn assert_rows_walk_real_edges(graph: &AdjacencyGraph, rows: &[PathRow]) {
    for row in rows {
        assert_eq!(
            row.vertices.len(),
            row.edges.len() + 1,
            "row must alternate vertex/edge/vertex"
        );
        for (i, &edge) in row.edges.iter().enumerate() {
            assert!(
                graph.has_edge(row.vertices[i], edge, row.vertices[i + 1]),
                "row step {} of {:?} is not an edge in the graph",
                i,
                row.vertices
            );
        }
    }
}

#[test]
fn diamond_finds_both_two_hop_paths() -> Result<()> {
    init_tracing();
    let graph = diamond();
    let params = SearchParams::new(v(1), v(3), 1, 3, 10)?;
    let mut rows = run(&graph, params, SearchOptions::default())?;
    rows.sort_by(|a, b| a.vertices.cmp(&b.vertices));

    assert_eq!(rows.len(), 2, "diamond has exactly two shortest paths");
    assert_eq!(rows[0].vertices, vec![v(1), v(2), v(3)]);
    assert_eq!(rows[1].vertices, vec![v(1), v(4), v(3)]);
    for row in &rows {
        assert_eq!(row.hops(), 2);
    }
    assert_rows_walk_real_edges(&graph, &rows);
    Ok(())
}

#[test]
fn direct_edge_found_at_one_hop() -> Result<()> {
    let mut g = AdjacencyGraph::new();
    let e = g.add_edge(v(1), v(2));
    let graph = Arc::new(g);

    let params = SearchParams::new(v(1), v(2), 1, 1, 10)?;
    let rows = run(&graph, params, SearchOptions::default())?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vertices, vec![v(1), v(2)]);
    assert_eq!(rows[0].edges, vec![e]);
    Ok(())
}

#[test]
fn zero_hop_trivial_path_when_endpoints_coincide() -> Result<()> {
    let graph = diamond();
    let params = SearchParams::new(v(1), v(1), 0, -1, 5)?;
    let rows = run(&graph, params, SearchOptions::default())?;
    assert_eq!(rows.len(), 1, "coincident endpoints emit one trivial row");
    assert_eq!(rows[0].vertices, vec![v(1)]);
    assert!(rows[0].edges.is_empty());
    assert_eq!(rows[0].hops(), 0);
    Ok(())
}

#[test]
fn min_hops_filters_short_paths() -> Result<()> {
    let mut g = AdjacencyGraph::new();
    g.add_edge(v(1), v(3));
    g.add_edge(v(1), v(2));
    g.add_edge(v(2), v(3));
    let graph = Arc::new(g);

    let params = SearchParams::new(v(1), v(3), 2, 3, 10)?;
    let rows = run(&graph, params, SearchOptions::default())?;
    assert!(!rows.is_empty());
    for row in &rows {
        assert!(
            row.hops() >= 2,
            "direct edge must be excluded by the minimum, got {:?}",
            row.vertices
        );
    }
    Ok(())
}

#[test]
fn disconnected_components_yield_no_rows() -> Result<()> {
    let mut g = AdjacencyGraph::new();
    g.add_edge(v(1), v(2));
    g.add_edge(v(10), v(11));
    let graph = Arc::new(g);

    let params = SearchParams::new(v(1), v(11), 1, 10, 100)?;
    let rows = run(&graph, params, SearchOptions::default())?;
    assert!(rows.is_empty(), "no path crosses components");
    Ok(())
}

#[test]
fn limit_stops_the_search_cleanly() -> Result<()> {
    let graph = diamond();
    let params = SearchParams::new(v(1), v(3), 1, 3, 1)?;
    let rows = run(&graph, params, SearchOptions::default())?;
    assert_eq!(rows.len(), 1, "limit=1 yields exactly one row");
    assert_rows_walk_real_edges(&graph, &rows);
    Ok(())
}

#[test]
fn hop_budget_bounds_every_row() -> Result<()> {
    let mut g = AdjacencyGraph::new();
    for i in 1..=6u64 {
        g.add_edge(v(i), v(i + 1));
    }
    g.add_edge(v(1), v(4));
    let graph = Arc::new(g);

    let params = SearchParams::new(v(1), v(7), 1, 4, 100)?;
    let rows = run(&graph, params, SearchOptions::default())?;
    assert!(!rows.is_empty());
    for row in &rows {
        assert!(row.hops() <= 4, "row exceeds the hop budget");
        assert!(row.hops() >= 1);
    }
    assert_rows_walk_real_edges(&graph, &rows);
    Ok(())
}

#[test]
fn cancellation_surfaces_as_error() -> Result<()> {
    let graph = diamond();
    let params = SearchParams::new(v(1), v(3), 1, 3, 10)?;
    let flag = Arc::new(AtomicBool::new(true));
    let mut search = PathSearch::new(
        params,
        SearchOptions::default(),
        Box::new(AdjacencyScanner::new(graph.clone())),
        Box::new(AdjacencyScanner::new(graph)),
        CancelToken::new(flag),
    )?;
    match search.next() {
        Some(Err(SearchError::Cancelled)) => {}
        other => panic!("expected cancellation, got {:?}", other.map(|r| r.is_ok())),
    }
    assert!(search.next().is_none(), "search fuses after an error");
    Ok(())
}

fn random_graph(seed: u64, vertices: u64, edges: usize) -> Arc<AdjacencyGraph> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let ids: Vec<VertexId> = (1..=vertices).map(v).collect();
    let mut g = AdjacencyGraph::new();
    // A spanning chain keeps the graph connected.
    for pair in ids.windows(2) {
        g.add_edge(pair[0], pair[1]);
    }
    for _ in 0..edges {
        let a = *ids.choose(&mut rng).unwrap();
        let b = *ids.choose(&mut rng).unwrap();
        if a != b {
            g.add_edge(a, b);
        }
    }
    Arc::new(g)
}

fn sorted_paths(mut rows: Vec<PathRow>) -> Vec<Vec<VertexId>> {
    rows.sort_by(|a, b| a.vertices.cmp(&b.vertices));
    rows.into_iter().map(|r| r.vertices).collect()
}

fn hop_histogram(rows: &[PathRow]) -> Vec<usize> {
    let mut hops: Vec<usize> = rows.iter().map(PathRow::hops).collect();
    hops.sort_unstable();
    hops
}

#[test]
fn spilled_searches_match_resident_searches() -> Result<()> {
    init_tracing();
    let spill_dir = tempfile::tempdir()?;
    for seed in 0..12u64 {
        let graph = random_graph(seed, 90, 180);
        for max_hops in [3i64, 5] {
            let params = SearchParams::new(v(1), v(90), 1, max_hops, 10_000)?;
            let resident = run(&graph, params.clone(), SearchOptions::default())?;
            for mem_budget in [96usize, 192, 1024, 8192] {
                let tight = SearchOptions {
                    table: TableOptions {
                        mem_budget,
                        initial_buckets: 2,
                        spill_root: Some(PathBuf::from(spill_dir.path())),
                    },
                    ..SearchOptions::default()
                };
                let spilled = run(&graph, params.clone(), tight)?;
                // Duplicate cancellation keeps the first path per vertex
                // and the arrival order depends on table geometry, so
                // intermediates can differ between runs. The number of
                // rows and their length distribution cannot.
                assert_eq!(
                    resident.len(),
                    spilled.len(),
                    "row count changed under seed {seed} max {max_hops} budget {mem_budget}"
                );
                assert_eq!(
                    hop_histogram(&resident),
                    hop_histogram(&spilled),
                    "length histogram changed under seed {seed} max {max_hops} budget {mem_budget}"
                );
                assert_rows_walk_real_edges(&graph, &spilled);
            }
        }
    }
    Ok(())
}

#[test]
fn spilled_rows_still_walk_real_edges() -> Result<()> {
    let graph = random_graph(7, 80, 160);
    let params = SearchParams::new(v(3), v(77), 1, 4, 500)?;
    let tight = SearchOptions {
        table: TableOptions {
            mem_budget: 256,
            initial_buckets: 2,
            spill_root: None,
        },
        ..SearchOptions::default()
    };
    let rows = run(&graph, params, tight)?;
    assert!(!rows.is_empty(), "endpoints are connected by the chain");
    assert_rows_walk_real_edges(&graph, &rows);
    Ok(())
}

#[test]
fn widening_the_budget_never_loses_rows() -> Result<()> {
    let graph = random_graph(11, 60, 90);
    let narrow = run(
        &graph,
        SearchParams::new(v(2), v(59), 1, 2, 10_000)?,
        SearchOptions::default(),
    )?;
    let wide = run(
        &graph,
        SearchParams::new(v(2), v(59), 1, 3, 10_000)?,
        SearchOptions::default(),
    )?;
    let narrow = sorted_paths(narrow);
    let wide = sorted_paths(wide);
    for path in &narrow {
        assert!(
            wide.contains(path),
            "path {:?} found under max=2 missing under max=3",
            path
        );
    }
    assert!(wide.len() >= narrow.len());
    Ok(())
}
