use std::collections::BTreeMap;

use tracing::debug;

use crate::clustering::kmeans::kmeans;
use crate::config::constant::KMEANS_SEED;
use crate::domain::location::Location;
use crate::geo;

/// A geographically-cohesive group of demand points, labeled `A`, `B`, ...
#[derive(Debug, Clone)]
pub struct GeographicCluster {
    pub id: char,
    pub locations: Vec<Location>,
    pub total_wco: f64,
    pub center_lat: f64,
    pub center_lon: f64,
    /// Estimated collection minutes across the cluster.
    pub total_time: f64,
}

impl GeographicCluster {
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Groups locations with seeded k-means and picks the cluster count that
/// scores best. Clustering runs before vehicle assignment so each vehicle's
/// first pass stays geographically local.
#[derive(Debug, Clone)]
pub struct GeographicClusterer {
    pub target_clusters: usize,
    pub capacity_threshold: f64,
    pub max_time_per_stop: f64,
    pub speed_kph: f64,
    pub volume_scaled: bool,
}

impl GeographicClusterer {
    pub fn new(max_time_per_stop: f64, speed_kph: f64) -> Self {
        GeographicClusterer {
            target_clusters: 5,
            capacity_threshold: 2000.0,
            max_time_per_stop,
            speed_kph,
            volume_scaled: false,
        }
    }

    fn estimate_collection_time(&self, location: &Location) -> f64 {
        geo::estimate_collection_time(location, self.max_time_per_stop, self.volume_scaled)
    }

    /// Cluster `locations`, trying every k in `[2, min(N, target)]` and
    /// keeping the lowest-scoring grouping. `pure_geographic` scores on
    /// shape alone; otherwise capacity and time balance join the score.
    pub fn cluster_locations(
        &self,
        locations: &[Location],
        pure_geographic: bool,
    ) -> Vec<GeographicCluster> {
        if locations.is_empty() {
            return Vec::new();
        }

        let coords: Vec<(f64, f64)> = locations.iter().map(|l| l.coordinates).collect();
        let max_possible = locations.len().min(self.target_clusters);
        if max_possible < 2 {
            return vec![self.build_cluster(0, locations.to_vec())];
        }

        let mut best_groups: Option<BTreeMap<usize, Vec<Location>>> = None;
        let mut best_score = f64::INFINITY;

        for n_clusters in 2..=max_possible {
            let labels = kmeans(&coords, n_clusters, KMEANS_SEED);

            let mut groups: BTreeMap<usize, Vec<Location>> = BTreeMap::new();
            for (i, label) in labels.iter().enumerate() {
                groups.entry(*label).or_default().push(locations[i].clone());
            }

            let score = if pure_geographic {
                self.score_geographic(&groups)
            } else {
                self.score_full(&groups)
            };

            if score < best_score {
                best_score = score;
                best_groups = Some(groups);
            }
        }

        let mut clusters: Vec<GeographicCluster> = best_groups
            .expect("at least one clustering evaluated")
            .into_iter()
            .map(|(label, members)| self.build_cluster(label, members))
            .collect();
        clusters.sort_by_key(|c| c.id);
        clusters
    }

    fn build_cluster(&self, label: usize, mut members: Vec<Location>) -> GeographicCluster {
        let center_lat = members.iter().map(|l| l.coordinates.0).sum::<f64>() / members.len() as f64;
        let center_lon = members.iter().map(|l| l.coordinates.1).sum::<f64>() / members.len() as f64;
        let total_wco = members.iter().map(|l| l.wco_amount).sum();
        let total_time = members.iter().map(|l| self.estimate_collection_time(l)).sum();

        // Heaviest generators first; coordinates break ties deterministically.
        members.sort_by(|a, b| {
            b.wco_amount
                .total_cmp(&a.wco_amount)
                .then(a.coordinates.0.total_cmp(&b.coordinates.0))
                .then(a.coordinates.1.total_cmp(&b.coordinates.1))
        });

        GeographicCluster {
            id: char::from(b'A' + label as u8),
            locations: members,
            total_wco,
            center_lat,
            center_lon,
            total_time,
        }
    }

    /// Shape-only score: tight, balanced clusters win. Lower is better.
    fn score_geographic(&self, groups: &BTreeMap<usize, Vec<Location>>) -> f64 {
        let total: usize = groups.values().map(|g| g.len()).sum();
        let mean_size = total as f64 / groups.len() as f64;

        groups
            .values()
            .map(|members| {
                let (mean_radius, max_radius) = cluster_radii(members);
                let size_deviation = (members.len() as f64 - mean_size).abs();
                3.0 * mean_radius + 2.0 * max_radius + 0.5 * size_deviation
            })
            .sum()
    }

    /// Geographic score plus capacity balance, time pressure, and a traffic
    /// term that penalizes spread-out clusters.
    fn score_full(&self, groups: &BTreeMap<usize, Vec<Location>>) -> f64 {
        let mut score = self.score_geographic(groups);

        for members in groups.values() {
            let total_wco: f64 = members.iter().map(|l| l.wco_amount).sum();
            let capacity_penalty =
                (total_wco - self.capacity_threshold).abs() / self.capacity_threshold;

            let total_time: f64 = members.iter().map(|l| self.estimate_collection_time(l)).sum();
            let time_penalty =
                (total_time - self.max_time_per_stop * members.len() as f64).max(0.0);

            let (mean_radius, _) = cluster_radii(members);
            let traffic_penalty = mean_radius / self.speed_kph;

            score += capacity_penalty + time_penalty + traffic_penalty;
        }

        score
    }

    pub fn print_cluster_analysis(&self, clusters: &[GeographicCluster]) {
        debug!("Cluster analysis ({} clusters):", clusters.len());
        for cluster in clusters {
            debug!(
                "  CLUSTER {}: center ({:.6}, {:.6}), {} locations, {:.2}L, {:.1} min",
                cluster.id,
                cluster.center_lat,
                cluster.center_lon,
                cluster.len(),
                cluster.total_wco,
                cluster.total_time
            );
            for loc in &cluster.locations {
                debug!(
                    "    {:<30} {:>8.2}L {:>5.1}min at ({:.6}, {:.6})",
                    loc.name,
                    loc.wco_amount,
                    self.estimate_collection_time(loc),
                    loc.coordinates.0,
                    loc.coordinates.1
                );
            }
        }
    }
}

/// (mean, max) haversine km from the cluster centroid to its members.
fn cluster_radii(members: &[Location]) -> (f64, f64) {
    if members.is_empty() {
        return (0.0, 0.0);
    }
    let center_lat = members.iter().map(|l| l.coordinates.0).sum::<f64>() / members.len() as f64;
    let center_lon = members.iter().map(|l| l.coordinates.1).sum::<f64>() / members.len() as f64;

    let mut sum = 0.0;
    let mut max = 0.0f64;
    for member in members {
        let r = geo::calculate_distance((center_lat, center_lon), member.coordinates);
        sum += r;
        max = max.max(r);
    }
    (sum / members.len() as f64, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str, coords: (f64, f64), wco: f64) -> Location {
        Location {
            id: id.to_string(),
            name: format!("loc {id}"),
            coordinates: coords,
            wco_amount: wco,
            disposal_schedule: 7,
            distance_from_depot: 0.0,
        }
    }

    #[test]
    fn single_location_yields_one_cluster() {
        let clusterer = GeographicClusterer::new(15.0, 30.0);
        let clusters = clusterer.cluster_locations(&[location("a", (7.0, 125.0), 50.0)], true);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, 'A');
        assert_eq!(clusters[0].len(), 1);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        let clusterer = GeographicClusterer::new(15.0, 30.0);
        assert!(clusterer.cluster_locations(&[], true).is_empty());
    }

    #[test]
    fn clustering_is_deterministic() {
        let clusterer = GeographicClusterer::new(15.0, 30.0);
        let locations: Vec<Location> = (0..12)
            .map(|i| {
                let group_offset = if i % 2 == 0 { 0.0 } else { 0.5 };
                location(
                    &format!("l{i}"),
                    (7.0 + group_offset + i as f64 * 0.001, 125.0),
                    20.0 + i as f64,
                )
            })
            .collect();

        let first = clusterer.cluster_locations(&locations, true);
        let second = clusterer.cluster_locations(&locations, true);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            let ids_a: Vec<&str> = a.locations.iter().map(|l| l.id.as_str()).collect();
            let ids_b: Vec<&str> = b.locations.iter().map(|l| l.id.as_str()).collect();
            assert_eq!(ids_a, ids_b);
        }
    }

    #[test]
    fn labels_are_sorted_and_members_by_descending_wco() {
        let clusterer = GeographicClusterer::new(15.0, 30.0);
        let locations = vec![
            location("a", (0.0, 0.0), 10.0),
            location("b", (0.001, 0.0), 90.0),
            location("c", (5.0, 5.0), 30.0),
            location("d", (5.001, 5.0), 70.0),
        ];
        let clusters = clusterer.cluster_locations(&locations, true);
        assert!(clusters.windows(2).all(|w| w[0].id < w[1].id));
        for cluster in &clusters {
            assert!(cluster
                .locations
                .windows(2)
                .all(|w| w[0].wco_amount >= w[1].wco_amount));
        }
    }

    #[test]
    fn totals_cover_all_members() {
        let clusterer = GeographicClusterer::new(15.0, 30.0);
        let locations = vec![
            location("a", (0.0, 0.0), 10.0),
            location("b", (0.001, 0.0), 90.0),
            location("c", (5.0, 5.0), 30.0),
        ];
        let clusters = clusterer.cluster_locations(&locations, false);
        let member_count: usize = clusters.iter().map(|c| c.len()).sum();
        let wco: f64 = clusters.iter().map(|c| c.total_wco).sum();
        assert_eq!(member_count, 3);
        assert!((wco - 130.0).abs() < 1e-9);
    }
}
