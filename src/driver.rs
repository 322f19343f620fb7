use std::sync::{
    atomic::{AtomicBool, Ordering::SeqCst},
    Arc,
};

use crossbeam::channel::bounded;
use thiserror::Error;

use crate::{
    geometry::{PointFeature, Polygon},
    params::Params,
    tangent::{find_tangents, Segment, TangentError, TangentPair},
};

// Max backlog of pair jobs and results in flight
const BACKLOG: usize = 1 << 10;

/// Structural input problems detected before any pairwise work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("empty input: {points} points, {polygons} polygons")]
    EmptyInput { points: usize, polygons: usize },
}

/// A skipped (point, polygon) pair and the reason it produced no tangents.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub point_id: String,
    pub polygon_id: String,
    pub reason: TangentError,
}

/// Result of one batch: segments in (point order, polygon order, max before
/// min) sequence, plus one warning per skipped pair.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub segments: Vec<Segment>,
    pub warnings: Vec<Warning>,
}

impl RunOutcome {
    fn record(&mut self, res: Result<TangentPair, Warning>) {
        match res {
            Ok(pair) => {
                self.segments.push(pair.max);
                self.segments.push(pair.min);
            }
            Err(warning) => {
                log::warn!(
                    "skipping pair ({}, {}): {}",
                    warning.point_id,
                    warning.polygon_id,
                    warning.reason
                );
                self.warnings.push(warning);
            }
        }
    }
}

fn check_inputs(points: &[PointFeature], polygons: &[Polygon]) -> Result<(), DriverError> {
    if points.is_empty() || polygons.is_empty() {
        return Err(DriverError::EmptyInput {
            points: points.len(),
            polygons: polygons.len(),
        });
    }
    Ok(())
}

fn pair_tangents(
    star: &PointFeature,
    polygon: &Polygon,
    inverse: bool,
) -> Result<TangentPair, Warning> {
    find_tangents(star, polygon, inverse).map_err(|reason| Warning {
        point_id: star.id.clone(),
        polygon_id: polygon.id.clone(),
        reason,
    })
}

/// Runs the tangent batch sequentially over the full cross product: every
/// point in input order against every polygon in input order. Failed pairs
/// are skipped and surface as warnings rather than aborting the batch.
pub fn run(
    points: &[PointFeature],
    polygons: &[Polygon],
    params: &Params,
) -> Result<RunOutcome, DriverError> {
    check_inputs(points, polygons)?;

    let total = points.len() * polygons.len();
    let mut outcome = RunOutcome {
        segments: Vec::with_capacity(2 * total),
        warnings: Vec::new(),
    };
    let mut done = 0;
    for star in points {
        for polygon in polygons {
            outcome.record(pair_tangents(star, polygon, params.inverse));
            done += 1;
            if params.progress_every > 0 && done % params.progress_every == 0 {
                log::info!("processed {}/{} pairs", done, total);
            }
        }
    }
    Ok(outcome)
}

/// Same semantics and output order as `run`, with pairs fanned out to
/// `params.n_threads` workers. Results are reassembled by pair index, so the
/// outcome is identical to the sequential driver's. Setting `cancel` stops
/// feeding and processing early; the outcome then holds the pairs that
/// completed before the flag was seen.
pub fn run_parallel(
    points: &[PointFeature],
    polygons: &[Polygon],
    params: &Params,
    cancel: &Arc<AtomicBool>,
) -> Result<RunOutcome, DriverError> {
    check_inputs(points, polygons)?;

    let n_threads = params.n_threads.max(1);
    let total = points.len() * polygons.len();
    let mut slots: Vec<Option<Result<TangentPair, Warning>>> = vec![None; total];
    let inverse = params.inverse;

    crossbeam::thread::scope(|s| {
        let (job_tx, job_rx) = bounded::<(usize, &PointFeature, &Polygon)>(BACKLOG);
        let (res_tx, res_rx) = bounded::<(usize, Result<TangentPair, Warning>)>(BACKLOG);

        for _ in 0..n_threads {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            let cancel = cancel.clone();
            s.spawn(move |_| {
                while let Ok((idx, star, polygon)) = job_rx.recv() {
                    // Keep draining after a cancel so a feeder blocked on the
                    // full job channel can finish and hang up.
                    if cancel.load(SeqCst) {
                        continue;
                    }
                    if res_tx.send((idx, pair_tangents(star, polygon, inverse))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(res_tx);

        // Feed the cross product in canonical order from a dedicated thread
        // so the bounded job channel never blocks the collector below.
        let feed_cancel = cancel.clone();
        s.spawn(move |_| {
            let pairs = points
                .iter()
                .flat_map(|star| polygons.iter().map(move |polygon| (star, polygon)));
            for (idx, (star, polygon)) in pairs.enumerate() {
                if feed_cancel.load(SeqCst) {
                    break;
                }
                if job_tx.send((idx, star, polygon)).is_err() {
                    break;
                }
            }
        });

        let mut done = 0;
        for (idx, res) in res_rx.iter() {
            slots[idx] = Some(res);
            done += 1;
            if params.progress_every > 0 && done % params.progress_every == 0 {
                log::info!("processed {}/{} pairs", done, total);
            }
        }
    })
    .unwrap();

    let mut outcome = RunOutcome {
        segments: Vec::with_capacity(2 * total),
        warnings: Vec::new(),
    };
    for slot in slots {
        // Empty slots are pairs the cancel flag cut off
        if let Some(res) = slot {
            outcome.record(res);
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Ring};
    use crate::params::Params;

    fn test_params() -> Params {
        Params {
            inverse: false,
            progress_every: 0,
            n_threads: 4,
        }
    }

    fn triangle(id: &str, cx: f64, cy: f64) -> Polygon {
        Polygon::new(
            id,
            vec![Ring::new(vec![
                Point::new(cx, cy + 1.0),
                Point::new(cx + 1.0, cy - 1.0),
                Point::new(cx - 1.0, cy - 1.0),
            ])],
        )
    }

    fn broken(id: &str) -> Polygon {
        Polygon::new(id, vec![Ring::new(vec![Point::new(0.0, 0.0)])])
    }

    #[test]
    fn output_follows_point_then_polygon_order() {
        let points = vec![
            PointFeature::new("s1", Point::new(10.0, 0.0)),
            PointFeature::new("s2", Point::new(-10.0, 0.0)),
        ];
        let polygons = vec![triangle("p1", 0.0, 0.0), triangle("p2", 0.0, 5.0)];
        let outcome = run(&points, &polygons, &test_params()).unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.segments.len(), 8);
        let labels: Vec<&str> = outcome.segments.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["s1_p1", "s1_p1", "s1_p2", "s1_p2", "s2_p1", "s2_p1", "s2_p2", "s2_p2"]
        );
        // Max before min within each pair
        for pair in outcome.segments.chunks(2) {
            assert!(pair[0].azimuth >= pair[1].azimuth);
        }
    }

    #[test]
    fn bad_polygon_skips_only_its_pairs() {
        let points = vec![
            PointFeature::new("s1", Point::new(10.0, 0.0)),
            PointFeature::new("s2", Point::new(-10.0, 0.0)),
        ];
        let polygons = vec![triangle("p1", 0.0, 0.0), broken("p2")];
        let outcome = run(&points, &polygons, &test_params()).unwrap();

        assert_eq!(outcome.segments.len(), 4);
        assert_eq!(outcome.warnings.len(), 2);
        for w in &outcome.warnings {
            assert_eq!(w.polygon_id, "p2");
            assert_eq!(
                w.reason,
                TangentError::InvalidRing {
                    id: "p2".to_string(),
                    n: 1
                }
            );
        }
        assert_eq!(outcome.warnings[0].point_id, "s1");
        assert_eq!(outcome.warnings[1].point_id, "s2");
    }

    #[test]
    fn empty_inputs_are_rejected_up_front() {
        let points = vec![PointFeature::new("s1", Point::new(0.0, 0.0))];
        let polygons = vec![triangle("p1", 5.0, 5.0)];

        let err = run(&[], &polygons, &test_params()).unwrap_err();
        assert_eq!(
            err,
            DriverError::EmptyInput {
                points: 0,
                polygons: 1
            }
        );
        let err = run(&points, &[], &test_params()).unwrap_err();
        assert_eq!(
            err,
            DriverError::EmptyInput {
                points: 1,
                polygons: 0
            }
        );
        let cancel = Arc::new(AtomicBool::new(false));
        let err = run_parallel(&[], &polygons, &test_params(), &cancel).unwrap_err();
        assert_eq!(
            err,
            DriverError::EmptyInput {
                points: 0,
                polygons: 1
            }
        );
    }

    #[test]
    fn parallel_matches_sequential() {
        let points: Vec<PointFeature> = (0..7)
            .map(|i| PointFeature::new(format!("s{}", i), Point::new(20.0 + i as f64, -3.0)))
            .collect();
        let mut polygons: Vec<Polygon> = (0..5)
            .map(|i| triangle(&format!("p{}", i), i as f64 * 4.0, i as f64))
            .collect();
        polygons.push(broken("pbad"));

        let params = test_params();
        let sequential = run(&points, &polygons, &params).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let parallel = run_parallel(&points, &polygons, &params, &cancel).unwrap();

        assert_eq!(sequential.segments, parallel.segments);
        assert_eq!(sequential.warnings, parallel.warnings);
    }

    #[test]
    fn pre_set_cancel_yields_empty_outcome() {
        let points = vec![PointFeature::new("s1", Point::new(10.0, 0.0))];
        let polygons = vec![triangle("p1", 0.0, 0.0)];
        let cancel = Arc::new(AtomicBool::new(true));
        let outcome = run_parallel(&points, &polygons, &test_params(), &cancel).unwrap();
        assert!(outcome.segments.is_empty());
        assert!(outcome.warnings.is_empty());
    }
}
