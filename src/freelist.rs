use crate::helpe::*;

/// A placement policy for [`FreeList::malloc`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, clap::ValueEnum)]
pub enum Policy {
    /// Leftmost block whose length is at least the request.
    #[value(name = "ff")]
    FirstFit,
    /// Like first fit, but the scan resumes from where the last
    /// successful allocation left off.
    #[value(name = "nf")]
    NextFit,
    /// Smallest block whose length is at least the request.
    #[value(name = "bf")]
    BestFit,
    /// Largest block whose length is at least the request.
    #[value(name = "wf")]
    WorstFit,
}

impl Policy {
    pub fn label(&self) -> &'static str {
        match self {
            Policy::FirstFit => "FF",
            Policy::NextFit  => "NF",
            Policy::BestFit  => "BF",
            Policy::WorstFit => "WF",
        }
    }
}

/// An ordered sequence of disjoint `(start, length)` runs over a fixed
/// linear address space of `total_units` indivisible units.
///
/// Runs are kept sorted ascending by `start` and never touch: the
/// union of all runs plus all live allocations is always exactly
/// `[0, total_units)`. [`FreeList::free`] is the only place that
/// restores this invariant after it's temporarily broken by appending
/// a newly-released run out of order.
#[derive(Debug, Clone)]
pub struct FreeList {
    total_units:    Units,
    runs:           Vec<(Units, Units)>,
    next_fit_index: usize,
}

impl FreeList {
    /// A freshly initialized list: the single run `(0, total_units)`.
    pub fn new(total_units: Units) -> Self {
        Self {
            total_units,
            runs:           vec![(0, total_units)],
            next_fit_index: 0,
        }
    }

    pub fn total_units(&self) -> Units {
        self.total_units
    }

    pub fn runs(&self) -> &[(Units, Units)] {
        &self.runs
    }

    /// Places a request of `bytes` bytes (rounded up to whole units)
    /// according to `policy`, bumping `counters` along the way.
    /// Returns `None` (the allocator's `-1` sentinel) on a zero-sized
    /// request or on failure to find a fitting run.
    pub fn malloc(&mut self, bytes: i64, unit_size: Units, policy: Policy, counters: &mut Counters) -> Option<Units> {
        let n = units(bytes, unit_size);
        if n == 0 {
            return None;
        }
        counters.alloc_calls += 1;

        let chosen = match policy {
            Policy::FirstFit => self.scan_first_fit(n, counters),
            Policy::NextFit  => self.scan_next_fit(n, counters),
            Policy::BestFit  => self.scan_best_fit(n, counters),
            Policy::WorstFit => self.scan_worst_fit(n, counters),
        };

        match chosen {
            Some((idx, start, length)) => {
                let leftover = length - n;
                if leftover > 0 {
                    self.runs[idx] = (start + n, leftover);
                } else {
                    self.runs.remove(idx);
                }
                Some(start)
            },
            None => {
                counters.alloc_fail += 1;
                None
            },
        }
    }

    fn scan_first_fit(&self, n: Units, counters: &mut Counters) -> Option<(usize, Units, Units)> {
        for (i, &(start, length)) in self.runs.iter().enumerate() {
            counters.ops_malloc += 1;
            if length >= n {
                return Some((i, start, length));
            }
        }
        None
    }

    /// Scans at most `|runs|` positions starting at the cursor,
    /// wrapping around. On success the cursor is left at the index the
    /// allocation came from; if that run was fully consumed (removed)
    /// and sat before the cursor, the cursor is nudged back by one so
    /// it keeps pointing at the same semantic position in the
    /// now-shorter list.
    fn scan_next_fit(&mut self, n: Units, counters: &mut Counters) -> Option<(usize, Units, Units)> {
        let len = self.runs.len();
        if len == 0 {
            return None;
        }
        self.next_fit_index %= len;

        for j in 0..len {
            let i = (self.next_fit_index + j) % len;
            counters.ops_malloc += 1;
            let (start, length) = self.runs[i];
            if length >= n {
                let removed = length == n;
                if removed && i < self.next_fit_index {
                    self.next_fit_index -= 1;
                } else if !removed {
                    self.next_fit_index = i;
                }
                return Some((i, start, length));
            }
        }

        None
    }

    fn scan_best_fit(&self, n: Units, counters: &mut Counters) -> Option<(usize, Units, Units)> {
        let mut best: Option<(usize, Units, Units)> = None;
        for (i, &(start, length)) in self.runs.iter().enumerate() {
            counters.ops_malloc += 1;
            if length >= n {
                match best {
                    Some((_, _, best_len)) if length >= best_len => {},
                    _ => best = Some((i, start, length)),
                }
            }
        }
        best
    }

    fn scan_worst_fit(&self, n: Units, counters: &mut Counters) -> Option<(usize, Units, Units)> {
        let mut worst: Option<(usize, Units, Units)> = None;
        for (i, &(start, length)) in self.runs.iter().enumerate() {
            counters.ops_malloc += 1;
            if length >= n {
                match worst {
                    Some((_, _, worst_len)) if length <= worst_len => {},
                    _ => worst = Some((i, start, length)),
                }
            }
        }
        worst
    }

    /// Releases `units` units starting at `start`. A no-op (uncounted)
    /// for a non-positive `start` or non-positive `units`. Otherwise
    /// appends the run, re-sorts by `start` (releases arrive in
    /// arbitrary order -- lifetime expiries and job completions race
    /// each other), then does one left-to-right coalescing pass,
    /// merging into the tail whenever it directly abuts the next run.
    pub fn free(&mut self, start: i64, units: i64, counters: &mut Counters) {
        if start < 0 || units <= 0 {
            return;
        }
        counters.free_calls += 1;

        self.runs.push((start as Units, units as Units));
        self.runs.sort_unstable_by_key(|&(s, _)| s);

        let mut merged: Vec<(Units, Units)> = Vec::with_capacity(self.runs.len());
        for &(s, l) in &self.runs {
            counters.ops_free += 1;
            match merged.last_mut() {
                Some((last_start, last_len)) if *last_start + *last_len == s => {
                    *last_len += l;
                },
                _ => merged.push((s, l)),
            }
        }
        self.runs = merged;
    }

    pub fn num_free_areas(&self) -> usize {
        self.runs.len()
    }

    pub fn largest_free(&self) -> Units {
        self.runs.iter().map(|&(_, l)| l).max().unwrap_or(0)
    }

    pub fn smallest_free(&self) -> Units {
        self.runs.iter().map(|&(_, l)| l).min().unwrap_or(0)
    }

    pub fn avg_free_size(&self) -> f64 {
        if self.runs.is_empty() {
            0.0
        } else {
            self.runs.iter().map(|&(_, l)| l as f64).sum::<f64>() / self.runs.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters() -> Counters { Counters::default() }

    #[test]
    fn initializes_to_one_run() {
        let fl = FreeList::new(10);
        assert_eq!(fl.runs(), &[(0, 10)]);
    }

    #[test]
    fn first_fit_and_hole_reuse_scenario() {
        // total_units=10, unit_size=8: the §8 literal scenario.
        let mut c = counters();
        let mut fl = FreeList::new(10);
        assert_eq!(fl.malloc(16, 8, Policy::FirstFit, &mut c), Some(0));
        assert_eq!(fl.malloc(16, 8, Policy::FirstFit, &mut c), Some(2));
        fl.free(0, 2, &mut c);
        assert_eq!(fl.runs(), &[(0, 2), (4, 6)]);
        assert_eq!(fl.malloc(16, 8, Policy::FirstFit, &mut c), Some(0));
    }

    #[test]
    fn worst_fit_prefers_the_larger_tail() {
        let mut c = counters();
        let mut fl = FreeList::new(10);
        assert_eq!(fl.malloc(16, 8, Policy::WorstFit, &mut c), Some(0));
        assert_eq!(fl.malloc(16, 8, Policy::WorstFit, &mut c), Some(2));
        fl.free(0, 2, &mut c);
        // Free list is now [(0,2), (4,6)]. A 2-unit request should
        // prefer the 6-unit tail over the 2-unit hole.
        assert_eq!(fl.malloc(16, 8, Policy::WorstFit, &mut c), Some(4));
    }

    #[test]
    fn best_fit_prefers_the_smaller_hole() {
        let mut c = counters();
        let mut fl = FreeList::new(10);
        assert_eq!(fl.malloc(16, 8, Policy::BestFit, &mut c), Some(0));
        assert_eq!(fl.malloc(16, 8, Policy::BestFit, &mut c), Some(2));
        fl.free(0, 2, &mut c);
        assert_eq!(fl.malloc(16, 8, Policy::BestFit, &mut c), Some(0));
    }

    #[test]
    fn coalescing_merges_out_of_order_releases() {
        let mut c = counters();
        let mut fl = FreeList::new(10);
        fl.runs = vec![(0, 2), (4, 2), (8, 2)];
        fl.free(2, 2, &mut c);
        assert_eq!(fl.runs(), &[(0, 6), (8, 2)]);
        fl.free(6, 2, &mut c);
        assert_eq!(fl.runs(), &[(0, 10)]);
    }

    #[test]
    fn malloc_free_round_trip_restores_union_of_runs() {
        let mut c = counters();
        let mut fl = FreeList::new(100);
        let loc = fl.malloc(240, 8, Policy::FirstFit, &mut c).unwrap();
        fl.free(loc as i64, units(240, 8) as i64, &mut c);
        assert_eq!(fl.runs(), &[(0, 100)]);
    }

    #[test]
    fn zero_byte_malloc_does_not_touch_counters() {
        let mut c = counters();
        let mut fl = FreeList::new(10);
        assert_eq!(fl.malloc(0, 8, Policy::FirstFit, &mut c), None);
        assert_eq!(c.alloc_calls, 0);
        assert_eq!(c.alloc_fail, 0);
    }

    #[test]
    fn degenerate_free_is_a_silent_no_op() {
        let mut c = counters();
        let mut fl = FreeList::new(10);
        fl.free(-1, 2, &mut c);
        fl.free(0, 0, &mut c);
        assert_eq!(c.free_calls, 0);
        assert_eq!(fl.runs(), &[(0, 10)]);
    }

    #[test]
    fn alloc_failure_when_nothing_fits() {
        let mut c = counters();
        let mut fl = FreeList::new(4);
        assert_eq!(fl.malloc(40, 8, Policy::FirstFit, &mut c), None);
        assert_eq!(c.alloc_fail, 1);
        assert_eq!(c.alloc_calls, 1);
    }

    #[test]
    fn next_fit_equals_first_fit_from_a_fresh_cursor() {
        let mut c1 = counters();
        let mut ff = FreeList::new(20);
        let mut c2 = counters();
        let mut nf = FreeList::new(20);

        assert_eq!(
            ff.malloc(16, 8, Policy::FirstFit, &mut c1),
            nf.malloc(16, 8, Policy::NextFit, &mut c2),
        );
    }

    #[test]
    fn next_fit_cursor_survives_wraparound_without_panicking() {
        let mut c = counters();
        let mut fl = FreeList::new(8);
        for _ in 0..8 {
            assert!(fl.malloc(8, 8, Policy::NextFit, &mut c).is_some());
        }
        assert_eq!(fl.malloc(8, 8, Policy::NextFit, &mut c), None);
    }
}
