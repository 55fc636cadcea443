use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::helpe::*;

/// The fixed seed every policy's run reseeds from. Reproducibility
/// across FF/NF/BF/WF and across repeated runs of the same policy both
/// depend on this constant never changing.
pub const SEED: u64 = 10;

/// One freshly arrived job's parameters, before it has been assigned
/// an id or attempted any allocation.
pub struct Arrival {
    pub kind:       JobKind,
    pub run_total:  Units,
    pub code_bytes: Units,
    pub stack_bytes:Units,
    pub heap_total: Units,
}

/// Deterministic RNG-driven arrival scheduling and job-parameter
/// sampling. Reseeded to [`SEED`] at the start of every policy's run so
/// all four policies see the identical stream of arrivals.
pub struct Workload {
    rng:            StdRng,
    base_arrival:   Units,
    next_arrival:   Units,
    small_pct:      i64,
    medium_pct:     i64,
    lost_mode:      bool,
    small_count:    u64,
    medium_count:   u64,
    large_count:    u64,
}

impl Workload {
    pub fn new(small_pct: i64, medium_pct: i64, lost_mode: bool) -> Self {
        let mut rng = StdRng::seed_from_u64(SEED);
        let base_arrival = 1;
        let next_arrival = base_arrival + rng.gen_range(0..=4);
        Self {
            rng,
            base_arrival,
            next_arrival,
            small_pct,
            medium_pct,
            lost_mode,
            small_count:  0,
            medium_count: 0,
            large_count:  0,
        }
    }

    /// Whether an arrival should fire at `sim_time`. Does not itself
    /// advance scheduling state -- call [`Workload::advance_arrival`]
    /// once the caller has decided to honor it.
    pub fn arrival_due(&self, sim_time: Units) -> bool {
        sim_time >= self.next_arrival
    }

    /// Mean inter-arrival time of 3 ticks, jittered by a uniform
    /// `[0, 4]` offset.
    pub fn advance_arrival(&mut self) {
        self.base_arrival += 3;
        self.next_arrival = self.base_arrival + self.rng.gen_range(0..=4);
    }

    /// Samples one job's type and size parameters, and whether it
    /// should be tagged a lost object (every 100th job of its type,
    /// only when lost mode is enabled).
    pub fn sample_arrival(&mut self) -> (Arrival, bool) {
        let r: i64 = self.rng.gen_range(1..=100);
        let kind = if r <= self.small_pct {
            JobKind::Small
        } else if r <= self.small_pct + self.medium_pct {
            JobKind::Medium
        } else {
            JobKind::Large
        };

        let count = match kind {
            JobKind::Small => { self.small_count += 1; self.small_count },
            JobKind::Medium => { self.medium_count += 1; self.medium_count },
            JobKind::Large => { self.large_count += 1; self.large_count },
        };
        let is_lost = self.lost_mode && count % 100 == 0;

        let (run_total, code_bytes, stack_bytes, heap_per_tick_base) = match kind {
            JobKind::Small  => (
                self.jitter(5, 1),
                self.jitter(60, 20),
                self.jitter(30, 10),
                50,
            ),
            JobKind::Medium => (
                self.jitter(10, 1),
                self.jitter(90, 30),
                self.jitter(60, 20),
                100,
            ),
            JobKind::Large  => (
                self.jitter(25, 1),
                self.jitter(170, 50),
                self.jitter(90, 30),
                250,
            ),
        };
        let heap_total = run_total * heap_per_tick_base;

        (
            Arrival { kind, run_total, code_bytes, stack_bytes, heap_total },
            is_lost,
        )
    }

    /// One heap allocation's byte size: `max(1, 35 ± 15)`.
    pub fn sample_heap_bytes(&mut self) -> Units {
        self.jitter(35, 15)
    }

    /// A heap block's lifetime in ticks, `uniform_int(1, run_left)`.
    /// `run_left` is always ≥ 1 when this is called (execution only
    /// attempts heap allocs while the job still has ticks left).
    pub fn sample_heap_lifetime(&mut self, run_left: Units) -> Units {
        if run_left <= 1 {
            1
        } else {
            self.rng.gen_range(1..=run_left)
        }
    }

    /// Whether this executing tick diverts the current job to I/O
    /// instead of running it (probability 0.05).
    pub fn roll_io_diversion(&mut self) -> bool {
        self.rng.gen_bool(0.05)
    }

    /// An I/O service time of `uniform_int(1, 3)` ticks.
    pub fn sample_io_duration(&mut self) -> Units {
        self.rng.gen_range(1..=3)
    }

    fn jitter(&mut self, base: i64, spread: i64) -> Units {
        let delta = self.rng.gen_range(-spread..=spread);
        at_least_one(base + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_schedule_advances_by_mean_three() {
        let mut w = Workload::new(30, 50, false);
        let first = w.next_arrival;
        assert!(first >= 1 && first <= 5);
        w.advance_arrival();
        assert!(w.next_arrival >= first + 1);
    }

    #[test]
    fn sampled_sizes_are_never_below_one() {
        let mut w = Workload::new(100, 0, false);
        for _ in 0..200 {
            let (a, _) = w.sample_arrival();
            assert!(a.run_total >= 1);
            assert!(a.code_bytes >= 1);
            assert!(a.stack_bytes >= 1);
            assert!(a.heap_total >= 1);
        }
    }

    #[test]
    fn lost_tagging_fires_every_hundredth_job_of_its_type_when_enabled() {
        let mut w = Workload::new(100, 0, true);
        let mut lost_indices = vec![];
        for i in 1..=250 {
            let (_, is_lost) = w.sample_arrival();
            if is_lost {
                lost_indices.push(i);
            }
        }
        assert_eq!(lost_indices, vec![100, 200]);
    }

    #[test]
    fn lost_tagging_never_fires_when_disabled() {
        let mut w = Workload::new(100, 0, false);
        for _ in 0..300 {
            let (_, is_lost) = w.sample_arrival();
            assert!(!is_lost);
        }
    }

    #[test]
    fn two_fresh_workloads_produce_identical_streams() {
        let mut a = Workload::new(30, 50, false);
        let mut b = Workload::new(30, 50, false);
        for _ in 0..50 {
            let (ja, _) = a.sample_arrival();
            let (jb, _) = b.sample_arrival();
            assert_eq!(ja.run_total, jb.run_total);
            assert_eq!(ja.code_bytes, jb.code_bytes);
            assert_eq!(ja.heap_total, jb.heap_total);
        }
    }

    #[test]
    fn heap_lifetime_never_exceeds_run_left() {
        let mut w = Workload::new(30, 50, false);
        for run_left in 1..=20 {
            for _ in 0..20 {
                let life = w.sample_heap_lifetime(run_left);
                assert!(life >= 1 && life <= run_left.max(1));
            }
        }
    }
}
