use clap::Parser;
use placesim::*;

/// Compares First Fit, Next Fit, Best Fit, and Worst Fit placement
/// under the same synthetic job workload
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Percentage of arrivals that are small jobs
    #[arg(long, default_value_t = 30)]
    small:          i64,

    /// Percentage of arrivals that are medium jobs
    #[arg(long, default_value_t = 50)]
    medium:         i64,

    /// Percentage of arrivals that are large jobs
    #[arg(long, default_value_t = 20)]
    large:          i64,

    /// Bytes per allocation unit
    #[arg(long, default_value_t = 8)]
    unit_size:      Units,

    /// Total address space, in units
    #[arg(long, default_value_t = 10000)]
    total_units:    Units,

    /// Label stamped into every summary file and the master summary
    #[arg(long, default_value = "run")]
    test_name:      String,

    /// Base path for the four per-policy summary files
    #[arg(long, default_value = "summary")]
    summary_base:   String,

    /// Base path for the four per-policy event logs
    #[arg(long, default_value = "log")]
    log_base:       String,

    /// Tag every 100th job of a type as a permanent leak
    #[arg(long, default_value_t = false)]
    lost_mode:      bool,

    /// Append one row per policy to master_summary.txt
    #[arg(long, default_value_t = false)]
    append_master:  bool,
}

fn main() {
    let cli = Args::parse();

    if cli.unit_size % 8 != 0 {
        eprintln!("warning: unit_size {} is not a multiple of 8", cli.unit_size);
    }

    let cfg = match SimConfig::new(
        cli.small, cli.medium, cli.large,
        cli.unit_size, cli.total_units,
        cli.test_name.clone(), cli.summary_base.clone(), cli.log_base.clone(),
        cli.lost_mode,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        },
    };

    let policies = [Policy::FirstFit, Policy::NextFit, Policy::BestFit, Policy::WorstFit];
    let mut results = Vec::with_capacity(policies.len());

    for policy in policies {
        let outcome = Simulator::new(cfg.clone(), policy)
            .and_then(Simulator::run);
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("error running {}: {}", policy.label(), e);
                std::process::exit(1);
            },
        }
    }

    print_final_table(&results);

    if cli.append_master {
        if let Err(e) = append_master_summary(&cfg, &results) {
            eprintln!("error appending master summary: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_final_table(results: &[PolicyResult]) {
    println!("{:<24}{:>12}{:>12}{:>12}{:>12}", "metric", "FF", "NF", "BF", "WF");
    print_row("small jobs",      results, |r| r.small_jobs as f64);
    print_row("medium jobs",     results, |r| r.medium_jobs as f64);
    print_row("large jobs",      results, |r| r.large_jobs as f64);
    print_row("finished jobs",   results, |r| r.finished_jobs as f64);
    print_row("mem used %",      results, |r| r.snapshot.mem_used_percent);
    print_row("mem free %",      results, |r| r.snapshot.mem_free_percent);
    print_row("internal frag %", results, |r| r.snapshot.internal_frag_percent);
    print_row("peak used %",     results, |r| r.snapshot.peak_used_percent);
    print_row("lost %",          results, |r| r.snapshot.lost_percent);
    print_row("heap allocs",     results, |r| r.snapshot.heap_alloc_count as f64);
    print_row("alloc calls",     results, |r| r.counters.alloc_calls as f64);
    print_row("alloc fail",      results, |r| r.alloc_fail_count as f64);
    print_row("ops/malloc",      results, |r| r.counters.avg_ops_per_alloc());
    print_row("ops/free",        results, |r| r.counters.avg_ops_per_free());
}

fn print_row(label: &str, results: &[PolicyResult], f: impl Fn(&PolicyResult) -> f64) {
    print!("{:<24}", label);
    for r in results {
        print!("{:>12.2}", f(r));
    }
    println!();
}

fn append_master_summary(cfg: &SimConfig, results: &[PolicyResult]) -> Result<(), SimError> {
    let mut file = OpenOptions::new().create(true).append(true).open("master_summary.txt")?;
    for r in results {
        writeln!(
            file,
            "{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{}\t{}\t{}\t{}\t{}",
            cfg.test_name,
            r.policy.label(),
            r.snapshot.mem_used_percent,
            r.snapshot.internal_frag_percent,
            r.snapshot.mem_free_percent,
            r.snapshot.lost_percent,
            r.snapshot.heap_alloc_count,
            r.counters.alloc_calls,
            r.counters.ops_malloc,
            r.counters.free_calls,
            r.counters.ops_free,
        )?;
    }
    Ok(())
}
