use crate::helpe::*;

/// A heap block allocated on behalf of a [`Job`] during one of its
/// executing ticks. Distinguishing `units` from `bytes` lets
/// [`crate::metrics`] tell internal fragmentation (unit rounding) apart
/// from bookkeeping of the original request.
#[derive(Debug, Clone, Copy)]
pub struct HeapBlock {
    pub loc:    Units,
    pub units:  Units,
    pub death:  Units,
    pub bytes:  Units,
}

/// The three job sizes the workload generator samples from. Each
/// carries its own run-time, code/stack size, and heap-total
/// distribution (see [`crate::workload::Workload`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Small,
    Medium,
    Large,
}

impl JobKind {
    #[inline(always)]
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Small  => "small",
            JobKind::Medium => "medium",
            JobKind::Large  => "large",
        }
    }
}

/// A complete description of one simulated process: its identity, its
/// type, how much CPU time it has left, the code/stack/heap it has
/// allocated, and whether it has been marked a "lost object" leaker.
///
/// Lifecycle: created on arrival, code and stack allocated, enters the
/// ready queue, alternates CPU/IO phases while emitting heap
/// allocations with finite lifetimes, then completes when
/// [`Job::run_left`] reaches zero -- at which point code, stack, and
/// any still-outstanding heap blocks are released, unless the job is
/// lost, in which case those heap blocks are counted as leaked instead.
#[derive(Debug, Clone)]
pub struct Job {
    pub id:             u32,
    pub kind:           JobKind,
    pub run_total:      Units,
    pub run_left:       Units,
    pub code_bytes:     Units,
    pub stack_bytes:    Units,
    pub heap_total:     Units,
    pub heap_left:      Units,
    pub start_time:     Units,
    pub code_loc:       Option<Units>,
    pub stack_loc:      Option<Units>,
    pub heap_blocks:    Vec<HeapBlock>,
    pub is_lost:        bool,
}

impl Job {
    #[inline(always)]
    pub fn new(
        id:         u32,
        kind:       JobKind,
        run_total:  Units,
        code_bytes: Units,
        stack_bytes:Units,
        heap_total: Units,
        start_time: Units,
        is_lost:    bool,
    ) -> Self {
        Self {
            id,
            kind,
            run_total,
            run_left:   run_total,
            code_bytes,
            stack_bytes,
            heap_total,
            heap_left:  heap_total,
            start_time,
            code_loc:   None,
            stack_loc:  None,
            heap_blocks:vec![],
            is_lost,
        }
    }

    /// How many heap elements this job should attempt to allocate on
    /// each executing tick. Always at least 1, so a job whose heap
    /// total is small relative to its run-time still makes progress.
    #[inline(always)]
    pub fn heap_per_tick(&self) -> Units {
        if self.run_total == 0 {
            return 0;
        }
        let per_tick = self.heap_total / self.run_total;
        if per_tick == 0 { 1 } else { per_tick }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_per_tick_floors_and_clamps_to_one() {
        let j = Job::new(1, JobKind::Small, 5, 60, 30, 12, 0, false);
        assert_eq!(j.heap_per_tick(), 2);

        let tiny = Job::new(2, JobKind::Small, 10, 60, 30, 3, 0, false);
        assert_eq!(tiny.heap_per_tick(), 1);
    }

    #[test]
    fn heap_per_tick_zero_run_total_is_zero() {
        let j = Job::new(1, JobKind::Small, 0, 1, 1, 1, 0, false);
        assert_eq!(j.heap_per_tick(), 0);
    }
}
