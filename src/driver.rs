use crate::helpe::*;
use crate::workload::Arrival;

/// What a single policy's run hands back to the CLI layer: the
/// end-of-run metrics snapshot plus the operation counters the
/// comparison table and master summary row both read from.
#[derive(Debug, Clone)]
pub struct PolicyResult {
    pub policy:          Policy,
    pub snapshot:        MetricsSnapshot,
    pub counters:        Counters,
    pub alloc_fail_count:u64,
    pub small_jobs:      u64,
    pub medium_jobs:     u64,
    pub large_jobs:      u64,
    pub finished_jobs:   u64,
}

/// The tick-driven simulation for one policy. Every field here is
/// private to one run -- nothing survives or leaks between policies,
/// which is what lets the CLI layer reseed and rerun four times from
/// an identical starting state.
pub struct Simulator {
    cfg:                SimConfig,
    policy:             Policy,
    free_list:          FreeList,
    counters:           Counters,
    workload:           Workload,
    emitter:            ResultEmitter,

    sim_time:           Units,
    job_id_counter:     u32,
    active:             BTreeMap<u32, Job>,
    ready_queue:        VecDeque<u32>,
    io_queue:           VecDeque<u32>,
    current_job:        Option<u32>,
    io_job:             Option<u32>,
    io_device_busy:     bool,
    io_done_time:       Units,

    allocated_units:    Units,
    required_bytes_sum: u64,
    max_allocated_units:Units,
    heap_alloc_count:   u64,
    heap_bytes_sum:     u64,
    lost_count:         u64,
    lost_bytes:         u64,
    alloc_fail_count:   u64,

    small_jobs:         u64,
    medium_jobs:        u64,
    large_jobs:         u64,
    finished_jobs:      u64,
}

impl Simulator {
    pub fn new(cfg: SimConfig, policy: Policy) -> Result<Self, SimError> {
        let summary_path = cfg.summary_path(policy);
        let log_path = cfg.log_path(policy);
        let emitter = ResultEmitter::new(&summary_path, &log_path)?;
        let workload = Workload::new(cfg.small_pct, cfg.medium_pct, cfg.lost_mode);
        let total_units = cfg.total_units;

        Ok(Self {
            free_list: FreeList::new(total_units),
            counters: Counters::new(),
            workload,
            emitter,
            cfg,
            policy,
            sim_time:           0,
            job_id_counter:     0,
            active:             BTreeMap::new(),
            ready_queue:        VecDeque::new(),
            io_queue:           VecDeque::new(),
            current_job:        None,
            io_job:              None,
            io_device_busy:     false,
            io_done_time:       0,
            allocated_units:    0,
            required_bytes_sum: 0,
            max_allocated_units:0,
            heap_alloc_count:   0,
            heap_bytes_sum:     0,
            lost_count:         0,
            lost_bytes:         0,
            alloc_fail_count:   0,
            small_jobs:         0,
            medium_jobs:        0,
            large_jobs:         0,
            finished_jobs:      0,
        })
    }

    /// Runs the full tick loop from `sim_time = 0` to `cfg.total_time`
    /// and returns the final metrics. `DESIGN.md` notes the reference
    /// crate's top-level driver prints its own progress this way.
    pub fn run(mut self) -> Result<PolicyResult, SimError> {
        let started = Instant::now();
        self.emitter.write_header(&self.cfg, self.policy)?;

        while self.sim_time < self.cfg.total_time {
            self.tick()?;
            self.sim_time += 1;
        }

        let snapshot = self.snapshot();
        self.emitter.write_final_blocks(self.sim_time, &snapshot, &self.counters)?;

        println!(
            "[{}] simulated {} ticks in {} us",
            self.policy.label(),
            self.cfg.total_time,
            started.elapsed().as_micros(),
        );

        Ok(PolicyResult {
            policy:           self.policy,
            snapshot,
            counters:         self.counters,
            alloc_fail_count: self.alloc_fail_count,
            small_jobs:       self.small_jobs,
            medium_jobs:      self.medium_jobs,
            large_jobs:       self.large_jobs,
            finished_jobs:    self.finished_jobs,
        })
    }

    fn snapshot(&self) -> MetricsSnapshot {
        crate::metrics::compute(&crate::metrics::MetricsInput {
            unit_size:           self.cfg.unit_size,
            allocated_units:     self.allocated_units,
            required_bytes_sum:  self.required_bytes_sum,
            free_list:           &self.free_list,
            heap_alloc_count:    self.heap_alloc_count,
            heap_bytes_sum:      self.heap_bytes_sum,
            lost_count:          self.lost_count,
            lost_bytes:          self.lost_bytes,
            max_allocated_units: self.max_allocated_units,
        })
    }

    fn tick(&mut self) -> Result<(), SimError> {
        if self.sim_time == 0 {
            self.emitter.log_phase_banner(self.sim_time, "Prefill Phase begins")?;
        } else if self.sim_time == self.cfg.prefill_time {
            self.emitter.log_phase_banner(self.sim_time, "Main Simulation Phase begins")?;
        }

        self.phase_arrival()?;
        self.phase_heap_sweep()?;
        self.phase_io_completion()?;
        self.phase_io_start()?;
        self.phase_cpu_dispatch()?;
        self.phase_execute()?;
        self.phase_metrics()?;

        Ok(())
    }

    fn phase_arrival(&mut self) -> Result<(), SimError> {
        if !self.workload.arrival_due(self.sim_time) {
            return Ok(());
        }
        self.workload.advance_arrival();

        let (arrival, is_lost) = self.workload.sample_arrival();
        let Arrival { kind, run_total, code_bytes, stack_bytes, heap_total } = arrival;
        let id = self.job_id_counter;

        match kind {
            JobKind::Small  => self.small_jobs += 1,
            JobKind::Medium => self.medium_jobs += 1,
            JobKind::Large  => self.large_jobs += 1,
        }

        let code_units = units(code_bytes as i64, self.cfg.unit_size);
        let code_loc = self.free_list.malloc(code_bytes as i64, self.cfg.unit_size, self.policy, &mut self.counters);

        let stack_loc = match code_loc {
            Some(_) => self.free_list.malloc(stack_bytes as i64, self.cfg.unit_size, self.policy, &mut self.counters),
            None => None,
        };

        match (code_loc, stack_loc) {
            (Some(code_loc), Some(stack_loc)) => {
                let stack_units = units(stack_bytes as i64, self.cfg.unit_size);
                self.allocated_units += code_units + stack_units;
                self.required_bytes_sum += (code_bytes + stack_bytes) as u64;
                self.max_allocated_units = self.max_allocated_units.max(self.allocated_units);

                let mut job = Job::new(id, kind, run_total, code_bytes, stack_bytes, heap_total, self.sim_time, is_lost);
                job.code_loc = Some(code_loc);
                job.stack_loc = Some(stack_loc);

                self.emitter.log_event(
                    self.sim_time, id, "ARRIVE",
                    &format!("type={} code={} stack={} heap_total={}", kind.label(), code_bytes, stack_bytes, heap_total),
                )?;

                self.active.insert(id, job);
                self.ready_queue.push_back(id);
                self.job_id_counter += 1;
            },
            (Some(code_loc), None) => {
                // Known quirk: the code allocation is not rolled back.
                // It is permanently lost to no job, so we fold it into
                // the running totals as if owned forever.
                self.allocated_units += code_units;
                self.required_bytes_sum += code_bytes as u64;
                self.max_allocated_units = self.max_allocated_units.max(self.allocated_units);
                let _ = code_loc;

                self.alloc_fail_count += 1;
                self.emitter.log_event(self.sim_time, id, "REJECTED", &format!("type={} reason=stack", kind.label()))?;
            },
            _ => {
                self.alloc_fail_count += 1;
                self.emitter.log_event(self.sim_time, id, "REJECTED", &format!("type={} reason=code", kind.label()))?;
            },
        }

        Ok(())
    }

    fn phase_heap_sweep(&mut self) -> Result<(), SimError> {
        let sim_time = self.sim_time;
        let mut to_free: Vec<(u32, HeapBlock)> = vec![];
        let mut to_lose: Vec<(u32, HeapBlock)> = vec![];

        for (&id, job) in self.active.iter_mut() {
            let is_lost = job.is_lost;
            job.heap_blocks.retain(|blk| {
                if sim_time < blk.death {
                    return true;
                }
                if is_lost {
                    to_lose.push((id, *blk));
                } else {
                    to_free.push((id, *blk));
                }
                false
            });
        }

        for (id, blk) in &to_free {
            self.free_list.free(blk.loc as i64, blk.units as i64, &mut self.counters);
            self.allocated_units = self.allocated_units.saturating_sub(blk.units);
            self.required_bytes_sum = self.required_bytes_sum.saturating_sub(blk.bytes as u64);
            self.emitter.log_event(self.sim_time, *id, "HEAP_FREE", &format!("loc={} units={}", blk.loc, blk.units))?;
        }
        for (id, blk) in &to_lose {
            self.lost_count += 1;
            self.lost_bytes += blk.bytes as u64;
            let _ = id;
        }

        Ok(())
    }

    fn phase_io_completion(&mut self) -> Result<(), SimError> {
        if self.io_device_busy && self.sim_time >= self.io_done_time {
            if let Some(id) = self.io_job.take() {
                self.emitter.log_event(self.sim_time, id, "IO_DONE", "")?;
                self.ready_queue.push_back(id);
            }
            self.io_device_busy = false;
        }
        Ok(())
    }

    fn phase_io_start(&mut self) -> Result<(), SimError> {
        if !self.io_device_busy {
            if let Some(id) = self.io_queue.pop_front() {
                self.io_job = Some(id);
                self.io_device_busy = true;
                self.io_done_time = self.sim_time + self.workload.sample_io_duration();
                self.emitter.log_event(self.sim_time, id, "IO_START", "")?;
            }
        }
        Ok(())
    }

    fn phase_cpu_dispatch(&mut self) -> Result<(), SimError> {
        if self.current_job.is_none() {
            if let Some(id) = self.ready_queue.pop_front() {
                self.current_job = Some(id);
                self.emitter.log_event(self.sim_time, id, "DISPATCH", "")?;
            }
        }
        Ok(())
    }

    fn phase_execute(&mut self) -> Result<(), SimError> {
        let Some(id) = self.current_job else { return Ok(()) };
        let run_left = self.active.get(&id).map(|j| j.run_left).unwrap_or(0);

        if run_left > 1 {
            if self.workload.roll_io_diversion() {
                self.current_job = None;
                self.io_queue.push_back(id);
                self.emitter.log_event(self.sim_time, id, "IO_REQUEST", "")?;
                return Ok(());
            }
            self.attempt_heap_allocs(id)?;
            if let Some(job) = self.active.get_mut(&id) {
                job.run_left -= 1;
            }
        } else {
            if let Some(job) = self.active.get_mut(&id) {
                job.run_left = job.run_left.saturating_sub(1);
            }
        }

        let finished = self.active.get(&id).map(|j| j.run_left == 0).unwrap_or(false);
        if finished {
            self.finish_job(id)?;
            self.current_job = None;
        }

        Ok(())
    }

    fn attempt_heap_allocs(&mut self, id: u32) -> Result<(), SimError> {
        let per_tick = self.active.get(&id).map(|j| j.heap_per_tick()).unwrap_or(0);
        for _ in 0..per_tick {
            let heap_left = self.active.get(&id).map(|j| j.heap_left).unwrap_or(0);
            if heap_left == 0 {
                break;
            }
            let run_left = self.active.get(&id).map(|j| j.run_left).unwrap_or(1);
            let bytes = self.workload.sample_heap_bytes();
            let lifetime = self.workload.sample_heap_lifetime(run_left);

            match self.free_list.malloc(bytes as i64, self.cfg.unit_size, self.policy, &mut self.counters) {
                Some(loc) => {
                    let blk_units = units(bytes as i64, self.cfg.unit_size);
                    let block = HeapBlock { loc, units: blk_units, death: self.sim_time + lifetime, bytes };
                    if let Some(job) = self.active.get_mut(&id) {
                        job.heap_blocks.push(block);
                        job.heap_left -= 1;
                    }
                    self.allocated_units += blk_units;
                    self.required_bytes_sum += bytes as u64;
                    self.max_allocated_units = self.max_allocated_units.max(self.allocated_units);
                    self.heap_alloc_count += 1;
                    self.heap_bytes_sum += bytes as u64;
                    self.emitter.log_event(self.sim_time, id, "HEAP_ALLOC", &format!("loc={} bytes={}", loc, bytes))?;
                },
                None => {
                    self.alloc_fail_count += 1;
                },
            }
        }
        Ok(())
    }

    fn finish_job(&mut self, id: u32) -> Result<(), SimError> {
        let Some(job) = self.active.remove(&id) else { return Ok(()) };

        if let Some(stack_loc) = job.stack_loc {
            let stack_units = units(job.stack_bytes as i64, self.cfg.unit_size);
            self.free_list.free(stack_loc as i64, stack_units as i64, &mut self.counters);
            self.allocated_units = self.allocated_units.saturating_sub(stack_units);
            self.required_bytes_sum = self.required_bytes_sum.saturating_sub(job.stack_bytes as u64);
        }
        if let Some(code_loc) = job.code_loc {
            let code_units = units(job.code_bytes as i64, self.cfg.unit_size);
            self.free_list.free(code_loc as i64, code_units as i64, &mut self.counters);
            self.allocated_units = self.allocated_units.saturating_sub(code_units);
            self.required_bytes_sum = self.required_bytes_sum.saturating_sub(job.code_bytes as u64);
        }

        for blk in &job.heap_blocks {
            if job.is_lost {
                self.lost_count += 1;
                self.lost_bytes += blk.bytes as u64;
            } else {
                self.free_list.free(blk.loc as i64, blk.units as i64, &mut self.counters);
                self.allocated_units = self.allocated_units.saturating_sub(blk.units);
                self.required_bytes_sum = self.required_bytes_sum.saturating_sub(blk.bytes as u64);
                self.emitter.log_event(self.sim_time, id, "HEAP_FREE", &format!("loc={} units={}", blk.loc, blk.units))?;
            }
        }

        self.finished_jobs += 1;
        self.emitter.log_event(self.sim_time, id, "FINISH", "")?;
        Ok(())
    }

    fn phase_metrics(&mut self) -> Result<(), SimError> {
        if self.sim_time == self.cfg.prefill_time {
            let snap = self.snapshot();
            self.emitter.write_prefill_block(self.sim_time, &snap)?;
        }
        if self.sim_time >= self.cfg.prefill_time && self.sim_time % 20 == 0 {
            let snap = self.snapshot();
            self.emitter.write_periodic_block(self.sim_time, &snap)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg(tag: &str) -> SimConfig {
        let dir = std::env::temp_dir();
        let mut cfg = SimConfig::new(
            30, 50, 20, 8, 2000,
            "driver_test".into(),
            dir.join(format!("placesim_test_summary_{}", tag)).to_string_lossy().into_owned(),
            dir.join(format!("placesim_test_log_{}", tag)).to_string_lossy().into_owned(),
            false,
        ).unwrap();
        cfg.total_time = 200;
        cfg.prefill_time = 40;
        cfg
    }

    fn cleanup(cfg: &SimConfig, policy: Policy) {
        let _ = std::fs::remove_file(cfg.summary_path(policy));
        let _ = std::fs::remove_file(cfg.log_path(policy));
    }

    #[test]
    fn short_run_keeps_allocated_units_within_bounds() {
        let cfg = test_cfg("bounds_ff");
        let sim = Simulator::new(cfg.clone(), Policy::FirstFit).unwrap();
        let result = sim.run().unwrap();
        assert!(result.counters.alloc_fail <= result.counters.alloc_calls);
        cleanup(&cfg, Policy::FirstFit);
    }

    #[test]
    fn two_runs_of_the_same_policy_are_deterministic() {
        let cfg1 = test_cfg("det_a");
        let cfg2 = test_cfg("det_b");
        let r1 = Simulator::new(cfg1.clone(), Policy::FirstFit).unwrap().run().unwrap();
        let r2 = Simulator::new(cfg2.clone(), Policy::FirstFit).unwrap().run().unwrap();
        assert_eq!(r1.counters.alloc_calls, r2.counters.alloc_calls);
        assert_eq!(r1.counters.ops_malloc, r2.counters.ops_malloc);
        assert_eq!(r1.snapshot.heap_alloc_count, r2.snapshot.heap_alloc_count);
        assert_eq!(r1.snapshot.lost_count, r2.snapshot.lost_count);
        cleanup(&cfg1, Policy::FirstFit);
        cleanup(&cfg2, Policy::FirstFit);
    }

    #[test]
    fn all_four_policies_see_the_identical_arrival_stream() {
        let policies = [Policy::FirstFit, Policy::NextFit, Policy::BestFit, Policy::WorstFit];
        let mut job_counts = vec![];
        for (i, p) in policies.iter().enumerate() {
            let cfg = test_cfg(&format!("stream_{}", i));
            let r = Simulator::new(cfg.clone(), *p).unwrap().run().unwrap();
            job_counts.push(r.small_jobs + r.medium_jobs + r.large_jobs);
            cleanup(&cfg, *p);
        }
        assert!(job_counts.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn event_log_uses_the_full_vocabulary() {
        let cfg = test_cfg("vocab_ff");
        let log_path = cfg.log_path(Policy::FirstFit);
        Simulator::new(cfg.clone(), Policy::FirstFit).unwrap().run().unwrap();

        let text = std::fs::read_to_string(&log_path).unwrap();
        for event in ["ARRIVE", "HEAP_ALLOC", "HEAP_FREE", "DISPATCH", "FINISH"] {
            assert!(text.contains(event), "missing {} in event log", event);
        }
        assert!(text.contains("Prefill Phase begins"));
        cleanup(&cfg, Policy::FirstFit);
    }
}
