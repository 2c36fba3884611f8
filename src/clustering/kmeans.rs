use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const MAX_ITERATIONS: usize = 100;

/// Lloyd's k-means over raw (lat, lon) points. Seeded, so the same input
/// always produces the same labels. Returns one label in `0..k` per point.
pub fn kmeans(points: &[(f64, f64)], k: usize, seed: u64) -> Vec<usize> {
    assert!(k >= 1, "k must be positive");
    if points.len() <= k {
        return (0..points.len()).collect();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids: Vec<(f64, f64)> = sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut labels = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let nearest = nearest_centroid(*point, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        // Recompute means; an emptied cluster is reseeded with the point
        // farthest from its centroid.
        let mut sums = vec![(0.0, 0.0, 0usize); k];
        for (i, point) in points.iter().enumerate() {
            let entry = &mut sums[labels[i]];
            entry.0 += point.0;
            entry.1 += point.1;
            entry.2 += 1;
        }
        for (c, (lat_sum, lon_sum, count)) in sums.into_iter().enumerate() {
            if count == 0 {
                let farthest = points
                    .iter()
                    .enumerate()
                    .max_by(|(ia, a), (ib, b)| {
                        squared_distance(**a, centroids[labels[*ia]])
                            .total_cmp(&squared_distance(**b, centroids[labels[*ib]]))
                    })
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                centroids[c] = points[farthest];
                changed = true;
            } else {
                centroids[c] = (lat_sum / count as f64, lon_sum / count as f64);
            }
        }

        if !changed {
            break;
        }
    }

    labels
}

fn nearest_centroid(point: (f64, f64), centroids: &[(f64, f64)]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, *centroid);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}
