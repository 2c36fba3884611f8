use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::constant::COORDINATE_TOLERANCE;
use crate::domain::location::{Location, RouteConstraints, Vehicle};
use crate::geo;
use crate::solvers::{Solver, SolverParams, SolverRoute};

/// Penalty scaling for guided local search, relative to the mean arc cost.
const PENALTY_WEIGHT: f64 = 0.3;

/// Waiting time a vehicle may insert at a stop before driving on, minutes.
/// Slack of the time dimension; cumuls may sit anywhere between the pure
/// transit sum and this much above it, inside the stop's window.
const TIME_SLACK_MINUTES: f64 = 60.0;

/// The primary solver: a capacitated routing model with a service+travel
/// time dimension (60-minute slack) and forbidden one-way transitions,
/// solved by cheapest-arc construction followed by guided local search
/// under a wall clock. Falls back to a distance-sorted single route when
/// no feasible construction exists.
#[derive(Debug, Clone)]
pub struct ConstrainedSolver {
    speed_kph: f64,
    stop_time_minutes: f64,
    max_daily_time: f64,
    time_limit: Duration,
}

impl ConstrainedSolver {
    pub fn new(params: &SolverParams) -> Self {
        ConstrainedSolver {
            speed_kph: params.speed_kph,
            stop_time_minutes: params.stop_time_minutes,
            max_daily_time: params.max_daily_time,
            time_limit: params.time_limit,
        }
    }
}

impl Solver for ConstrainedSolver {
    fn id(&self) -> &'static str {
        "ortools"
    }

    fn name(&self) -> &'static str {
        "Constrained Route Solver"
    }

    fn description(&self) -> &'static str {
        "Constraint-based optimization with capacity and working-time dimensions. Best for complex routing problems."
    }

    fn solve(
        &self,
        locations: &[Location],
        vehicles: &[Vehicle],
        constraints: &RouteConstraints,
    ) -> Vec<SolverRoute> {
        if locations.is_empty() || vehicles.is_empty() {
            return vehicles.iter().map(|_| Vec::new()).collect();
        }
        if locations.len() == 1 {
            return vec![vec![None, Some(locations[0].clone()), None]];
        }

        let model = RoutingModel::build(
            locations,
            vehicles,
            constraints,
            self.speed_kph,
            self.stop_time_minutes,
            self.max_daily_time,
        );

        let Some(initial) = model.cheapest_arc_construction() else {
            warn!("no feasible construction found, falling back to distance-sorted route");
            return fallback_routes(locations);
        };

        let best = model.guided_local_search(initial, self.time_limit);
        debug!(cost = model.solution_cost(&best), "constrained solver finished");

        let mut output: Vec<SolverRoute> = Vec::with_capacity(vehicles.len());
        for route in &best {
            if route.is_empty() {
                output.push(Vec::new());
                continue;
            }
            let mut stops: SolverRoute = vec![None];
            stops.extend(route.iter().map(|&node| Some(locations[node - 1].clone())));
            stops.push(None);
            output.push(stops);
        }
        output
    }
}

/// Distance-sorted single route, used whenever the model cannot be solved.
fn fallback_routes(locations: &[Location]) -> Vec<SolverRoute> {
    let mut sorted: Vec<Location> = locations.to_vec();
    sorted.sort_by(|a, b| {
        a.distance_from_depot
            .total_cmp(&b.distance_from_depot)
            .then(a.id.cmp(&b.id))
    });

    let mut route: SolverRoute = vec![None];
    route.extend(sorted.into_iter().map(Some));
    route.push(None);
    vec![route]
}

/// Node 0 is the depot; node `i + 1` is `locations[i]`.
struct RoutingModel<'a> {
    locations: &'a [Location],
    /// Integer-rounded km between nodes.
    distance: Vec<Vec<i64>>,
    /// Service time at `from` plus travel `from -> to`, minutes.
    transit_minutes: Vec<Vec<f64>>,
    /// Demand in deciliters-of-ten: `round(wco * 10)`.
    demands: Vec<i64>,
    capacities: Vec<i64>,
    forbidden: HashSet<(usize, usize)>,
    max_daily_time: f64,
}

type Routes = Vec<Vec<usize>>;

#[derive(Debug, Clone, Copy)]
enum Move {
    Relocate {
        from_route: usize,
        from_pos: usize,
        to_route: usize,
        to_pos: usize,
    },
    Swap {
        route_a: usize,
        pos_a: usize,
        route_b: usize,
        pos_b: usize,
    },
    TwoOpt {
        route: usize,
        start: usize,
        end: usize,
    },
}

impl<'a> RoutingModel<'a> {
    fn build(
        locations: &'a [Location],
        vehicles: &[Vehicle],
        constraints: &RouteConstraints,
        speed_kph: f64,
        stop_time_minutes: f64,
        max_daily_time: f64,
    ) -> Self {
        let n = locations.len() + 1;
        let depot = vehicles[0].depot_location;
        let coords = |node: usize| {
            if node == 0 {
                depot
            } else {
                locations[node - 1].coordinates
            }
        };

        let mut distance = vec![vec![0i64; n]; n];
        let mut transit_minutes = vec![vec![0.0f64; n]; n];
        for from in 0..n {
            for to in 0..n {
                let km = geo::calculate_distance(coords(from), coords(to));
                distance[from][to] = km.round() as i64;
                let service = if from == 0 { 0.0 } else { stop_time_minutes };
                transit_minutes[from][to] = service + geo::estimate_travel_time(km, speed_kph);
            }
        }

        let mut demands = vec![0i64; n];
        for (i, loc) in locations.iter().enumerate() {
            demands[i + 1] = (loc.wco_amount * 10.0).round() as i64;
        }
        let capacities = vehicles
            .iter()
            .map(|v| (v.capacity * 10.0).round() as i64)
            .collect();

        // A one-way road (from, to) forbids driving the to -> from arc.
        let mut forbidden = HashSet::new();
        for (road_from, road_to) in &constraints.one_way_roads {
            let match_node = |target: (f64, f64)| {
                (0..n).find(|&node| {
                    geo::coordinates_match(coords(node), target, COORDINATE_TOLERANCE)
                })
            };
            match (match_node(*road_from), match_node(*road_to)) {
                (Some(from_node), Some(to_node)) => {
                    forbidden.insert((to_node, from_node));
                }
                _ => {
                    debug!("one-way road endpoints not in current problem, skipping");
                }
            }
        }

        RoutingModel {
            locations,
            distance,
            transit_minutes,
            demands,
            capacities,
            forbidden,
            max_daily_time,
        }
    }

    fn node_count(&self) -> usize {
        self.locations.len() + 1
    }

    /// Hard feasibility: capacity, forbidden arcs, and the time dimension.
    /// Cumulative time propagates as an [earliest, latest] interval: each
    /// leg adds its transit to both bounds, each stop may additionally
    /// absorb up to `TIME_SLACK_MINUTES` of waiting, and the interval is
    /// clamped to the stop's window `[0, max_daily_time]` (the depot end
    /// window is `[0, 2 * max]`). A route is feasible while the interval
    /// stays non-empty.
    fn route_is_feasible(&self, route: &[usize], vehicle_idx: usize) -> bool {
        let mut load = 0i64;
        let mut earliest = 0.0f64;
        let mut latest = 0.0f64;
        let mut prev = 0usize;

        for &node in route {
            if self.forbidden.contains(&(prev, node)) {
                return false;
            }
            load += self.demands[node];
            if load > self.capacities[vehicle_idx] {
                return false;
            }
            earliest += self.transit_minutes[prev][node];
            latest = (latest + self.transit_minutes[prev][node] + TIME_SLACK_MINUTES)
                .min(self.max_daily_time);
            if earliest > latest {
                return false;
            }
            prev = node;
        }

        if self.forbidden.contains(&(prev, 0)) {
            return false;
        }
        earliest += self.transit_minutes[prev][0];
        latest = (latest + self.transit_minutes[prev][0] + TIME_SLACK_MINUTES)
            .min(2.0 * self.max_daily_time);
        earliest <= latest
    }

    fn route_cost(&self, route: &[usize]) -> i64 {
        if route.is_empty() {
            return 0;
        }
        let mut cost = 0;
        let mut prev = 0usize;
        for &node in route {
            cost += self.distance[prev][node];
            prev = node;
        }
        cost + self.distance[prev][0]
    }

    fn solution_cost(&self, routes: &Routes) -> i64 {
        routes.iter().map(|r| self.route_cost(r)).sum()
    }

    fn augmented_route_cost(
        &self,
        route: &[usize],
        penalties: &HashMap<(usize, usize), i64>,
        lambda: f64,
    ) -> f64 {
        if route.is_empty() {
            return 0.0;
        }
        let mut cost = 0.0;
        let mut prev = 0usize;
        for &node in route {
            let p = penalties.get(&(prev, node)).copied().unwrap_or(0);
            cost += self.distance[prev][node] as f64 + lambda * p as f64;
            prev = node;
        }
        let p = penalties.get(&(prev, 0)).copied().unwrap_or(0);
        cost + self.distance[prev][0] as f64 + lambda * p as f64
    }

    fn augmented_cost(
        &self,
        routes: &Routes,
        penalties: &HashMap<(usize, usize), i64>,
        lambda: f64,
    ) -> f64 {
        routes
            .iter()
            .map(|r| self.augmented_route_cost(r, penalties, lambda))
            .sum()
    }

    /// First solution: repeatedly extend each vehicle with the cheapest
    /// feasible arc. Returns None when any location cannot be placed.
    fn cheapest_arc_construction(&self) -> Option<Routes> {
        let mut unassigned: BTreeSet<usize> = (1..self.node_count()).collect();
        let mut routes: Routes = vec![Vec::new(); self.capacities.len()];

        for (v_idx, route) in routes.iter_mut().enumerate() {
            loop {
                let prev = route.last().copied().unwrap_or(0);
                let candidate = unassigned
                    .iter()
                    .copied()
                    .filter(|&node| {
                        let mut extended = route.clone();
                        extended.push(node);
                        self.route_is_feasible(&extended, v_idx)
                    })
                    .min_by_key(|&node| (self.distance[prev][node], node));

                match candidate {
                    Some(node) => {
                        route.push(node);
                        unassigned.remove(&node);
                    }
                    None => break,
                }
            }
        }

        unassigned.is_empty().then_some(routes)
    }

    /// Improvement phase: steepest-descent over relocate/swap/2-opt on a
    /// penalty-augmented objective; at each local optimum the highest
    /// utility arcs of the incumbent are penalized. Runs until the wall
    /// clock expires or the search stagnates.
    fn guided_local_search(&self, initial: Routes, time_limit: Duration) -> Routes {
        let deadline = Instant::now() + time_limit;
        let mut current = initial.clone();
        let mut best = initial;
        let mut best_cost = self.solution_cost(&best);

        let mut penalties: HashMap<(usize, usize), i64> = HashMap::new();
        let arc_count = (self.node_count() * 2).max(1);
        let lambda = PENALTY_WEIGHT * best_cost as f64 / arc_count as f64;

        let n = self.locations.len();
        let stagnation_limit = 100.max(10 * n);
        let mut stagnation = 0usize;

        while Instant::now() < deadline && stagnation < stagnation_limit {
            let moves = self.enumerate_moves(&current);
            if moves.is_empty() {
                break;
            }

            let current_aug = self.augmented_cost(&current, &penalties, lambda);
            let evaluated: Vec<(f64, usize)> = moves
                .par_iter()
                .enumerate()
                .filter_map(|(i, mv)| {
                    let candidate = self.apply_move(&current, *mv);
                    let feasible = candidate
                        .iter()
                        .enumerate()
                        .all(|(v, r)| self.route_is_feasible(r, v));
                    if !feasible {
                        return None;
                    }
                    Some((self.augmented_cost(&candidate, &penalties, lambda), i))
                })
                .collect();

            let improving = evaluated
                .into_iter()
                .filter(|(aug, _)| *aug < current_aug - 1e-9)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            match improving {
                Some((_, move_idx)) => {
                    current = self.apply_move(&current, moves[move_idx]);
                    let cost = self.solution_cost(&current);
                    if cost < best_cost {
                        best_cost = cost;
                        best = current.clone();
                        stagnation = 0;
                        debug!(cost, "new best solution");
                        continue;
                    }
                }
                None => {
                    // Local optimum on the augmented objective: penalize the
                    // most expensive lightly-penalized arcs of the incumbent.
                    self.penalize_arcs(&current, &mut penalties);
                }
            }
            stagnation += 1;
        }

        best
    }

    fn penalize_arcs(&self, routes: &Routes, penalties: &mut HashMap<(usize, usize), i64>) {
        let mut worst_utility = f64::NEG_INFINITY;
        let mut worst_arcs: Vec<(usize, usize)> = Vec::new();

        for route in routes {
            if route.is_empty() {
                continue;
            }
            let mut prev = 0usize;
            for &node in route.iter().chain(std::iter::once(&0)) {
                let p = penalties.get(&(prev, node)).copied().unwrap_or(0);
                let utility = self.distance[prev][node] as f64 / (1.0 + p as f64);
                if utility > worst_utility + 1e-9 {
                    worst_utility = utility;
                    worst_arcs = vec![(prev, node)];
                } else if (utility - worst_utility).abs() <= 1e-9 {
                    worst_arcs.push((prev, node));
                }
                prev = node;
            }
        }

        for arc in worst_arcs {
            *penalties.entry(arc).or_insert(0) += 1;
        }
    }

    fn enumerate_moves(&self, routes: &Routes) -> Vec<Move> {
        let mut moves = Vec::new();
        let route_count = routes.len();

        for from_route in 0..route_count {
            for from_pos in 0..routes[from_route].len() {
                // Relocations, including into empty routes.
                for to_route in 0..route_count {
                    let max_pos = if to_route == from_route {
                        routes[to_route].len() - 1
                    } else {
                        routes[to_route].len()
                    };
                    for to_pos in 0..=max_pos {
                        if to_route == from_route && to_pos == from_pos {
                            continue;
                        }
                        moves.push(Move::Relocate {
                            from_route,
                            from_pos,
                            to_route,
                            to_pos,
                        });
                    }
                }

                // Swaps with any later stop.
                for route_b in from_route..route_count {
                    let start = if route_b == from_route { from_pos + 1 } else { 0 };
                    for pos_b in start..routes[route_b].len() {
                        moves.push(Move::Swap {
                            route_a: from_route,
                            pos_a: from_pos,
                            route_b,
                            pos_b,
                        });
                    }
                }
            }

            // Segment reversals within a route.
            let len = routes[from_route].len();
            for start in 0..len {
                for end in (start + 2)..len {
                    moves.push(Move::TwoOpt {
                        route: from_route,
                        start,
                        end,
                    });
                }
            }
        }

        moves
    }

    fn apply_move(&self, routes: &Routes, mv: Move) -> Routes {
        let mut next = routes.clone();
        match mv {
            Move::Relocate {
                from_route,
                from_pos,
                to_route,
                to_pos,
            } => {
                let node = next[from_route].remove(from_pos);
                next[to_route].insert(to_pos, node);
            }
            Move::Swap {
                route_a,
                pos_a,
                route_b,
                pos_b,
            } => {
                if route_a == route_b {
                    next[route_a].swap(pos_a, pos_b);
                } else {
                    let a = next[route_a][pos_a];
                    let b = next[route_b][pos_b];
                    next[route_a][pos_a] = b;
                    next[route_b][pos_b] = a;
                }
            }
            Move::TwoOpt { route, start, end } => {
                next[route][start..=end].reverse();
            }
        }
        next
    }
}
