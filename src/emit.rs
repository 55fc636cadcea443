use crate::helpe::*;

/// Owns the two output handles for one policy's run: the summary file
/// and the event log. Both are opened at construction and flushed
/// on every successful write; `Drop`ping a `BufWriter` already flushes
/// best-effort, but we flush explicitly after each block so a panic or
/// an early `?` return during the run still leaves whatever was
/// written intact on disk.
pub struct ResultEmitter {
    summary:    BufWriter<File>,
    log:        BufWriter<File>,
}

impl ResultEmitter {
    pub fn new(summary_path: &PathBuf, log_path: &PathBuf) -> Result<Self, SimError> {
        let summary = OpenOptions::new().create(true).write(true).truncate(true).open(summary_path)?;
        let log = OpenOptions::new().create(true).write(true).truncate(true).open(log_path)?;
        Ok(Self {
            summary: BufWriter::new(summary),
            log:     BufWriter::new(log),
        })
    }

    pub fn write_header(&mut self, cfg: &SimConfig, policy: Policy) -> Result<(), SimError> {
        writeln!(self.summary, "test: {}", cfg.test_name)?;
        writeln!(self.summary, "policy: {}", policy.label())?;
        writeln!(self.summary, "percentages: small={} medium={} large={}", cfg.small_pct, cfg.medium_pct, cfg.large_pct)?;
        writeln!(self.summary, "unit_size: {}", cfg.unit_size)?;
        writeln!(self.summary, "total_units: {}", cfg.total_units)?;
        writeln!(self.summary, "lost_mode: {}", cfg.lost_mode)?;
        self.summary.flush()?;
        Ok(())
    }

    pub fn log_phase_banner(&mut self, sim_time: Units, banner: &str) -> Result<(), SimError> {
        writeln!(self.log, "time {}: {}", sim_time, banner)?;
        self.log.flush()?;
        Ok(())
    }

    /// `time <t>: job <id> <EVENT> <kv pairs>`, the fixed shape every
    /// event line shares regardless of vocabulary member.
    pub fn log_event(&mut self, sim_time: Units, job_id: u32, event: &str, kv: &str) -> Result<(), SimError> {
        if kv.is_empty() {
            writeln!(self.log, "time {}: job {} {}", sim_time, job_id, event)?;
        } else {
            writeln!(self.log, "time {}: job {} {} {}", sim_time, job_id, event, kv)?;
        }
        self.log.flush()?;
        Ok(())
    }

    pub fn write_metrics_block(&mut self, label: &str, sim_time: Units, snap: &MetricsSnapshot) -> Result<(), SimError> {
        writeln!(self.summary, "--- {} (t={}) ---", label, sim_time)?;
        writeln!(self.summary, "mem_used_percent: {:.2}", snap.mem_used_percent)?;
        writeln!(self.summary, "mem_free_percent: {:.2}", snap.mem_free_percent)?;
        writeln!(self.summary, "internal_frag_bytes: {}", snap.internal_frag_bytes)?;
        writeln!(self.summary, "internal_frag_percent: {:.2}", snap.internal_frag_percent)?;
        writeln!(self.summary, "num_free_areas: {}", snap.num_free_areas)?;
        writeln!(self.summary, "largest_free: {}", snap.largest_free)?;
        writeln!(self.summary, "smallest_free: {}", snap.smallest_free)?;
        writeln!(self.summary, "avg_free_size: {:.2}", snap.avg_free_size)?;
        writeln!(self.summary, "heap_alloc_count: {}", snap.heap_alloc_count)?;
        writeln!(self.summary, "lost_count: {}", snap.lost_count)?;
        writeln!(self.summary, "lost_percent: {:.2}", snap.lost_percent)?;
        writeln!(self.summary, "peak_used_percent: {:.2}", snap.peak_used_percent)?;
        self.summary.flush()?;
        Ok(())
    }

    pub fn write_prefill_block(&mut self, sim_time: Units, snap: &MetricsSnapshot) -> Result<(), SimError> {
        self.write_metrics_block("prefill", sim_time, snap)
    }

    pub fn write_periodic_block(&mut self, sim_time: Units, snap: &MetricsSnapshot) -> Result<(), SimError> {
        self.write_metrics_block("periodic", sim_time, snap)
    }

    /// Final, extra, and efficiency blocks, all derived from the same
    /// end-of-run snapshot plus operation counters -- three labeled
    /// sections rather than one, matching the distilled layout.
    pub fn write_final_blocks(&mut self, sim_time: Units, snap: &MetricsSnapshot, counters: &Counters) -> Result<(), SimError> {
        self.write_metrics_block("final", sim_time, snap)?;
        writeln!(self.summary, "--- extra ---")?;
        writeln!(self.summary, "alloc_calls: {}", counters.alloc_calls)?;
        writeln!(self.summary, "alloc_fail: {}", counters.alloc_fail)?;
        writeln!(self.summary, "free_calls: {}", counters.free_calls)?;
        writeln!(self.summary, "ops_malloc: {}", counters.ops_malloc)?;
        writeln!(self.summary, "ops_free: {}", counters.ops_free)?;
        writeln!(self.summary, "--- efficiency ---")?;
        writeln!(self.summary, "avg_ops_per_alloc: {:.3}", counters.avg_ops_per_alloc())?;
        writeln!(self.summary, "avg_ops_per_free: {:.3}", counters.avg_ops_per_free())?;
        self.summary.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tmp_paths(tag: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir();
        (
            dir.join(format!("placesim_test_summary_{}.txt", tag)),
            dir.join(format!("placesim_test_log_{}.txt", tag)),
        )
    }

    #[test]
    fn header_and_event_lines_land_on_disk() {
        let (summary_path, log_path) = tmp_paths("emit_header");
        let cfg = SimConfig::new(30, 50, 20, 8, 1000, "t".into(), "s".into(), "l".into(), false).unwrap();
        {
            let mut emitter = ResultEmitter::new(&summary_path, &log_path).unwrap();
            emitter.write_header(&cfg, Policy::FirstFit).unwrap();
            emitter.log_event(5, 3, "ARRIVE", "code=10 stack=5").unwrap();
        }
        let summary_text = fs::read_to_string(&summary_path).unwrap();
        let log_text = fs::read_to_string(&log_path).unwrap();
        assert!(summary_text.contains("policy: FF"));
        assert!(log_text.contains("time 5: job 3 ARRIVE code=10 stack=5"));
        let _ = fs::remove_file(&summary_path);
        let _ = fs::remove_file(&log_path);
    }

    #[test]
    fn event_with_no_kv_pairs_omits_trailing_space() {
        let (summary_path, log_path) = tmp_paths("emit_no_kv");
        {
            let mut emitter = ResultEmitter::new(&summary_path, &log_path).unwrap();
            emitter.log_event(0, 1, "FINISH", "").unwrap();
        }
        let log_text = fs::read_to_string(&log_path).unwrap();
        assert_eq!(log_text.trim_end(), "time 0: job 1 FINISH");
        let _ = fs::remove_file(&summary_path);
        let _ = fs::remove_file(&log_path);
    }
}
