use crate::helpe::*;

/// A point-in-time snapshot of memory and allocator-work metrics,
/// computed as a pure function of allocator state plus the running
/// bookkeeping scalars the driver maintains alongside it. Nothing here
/// mutates; the same inputs always yield the same snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub total_bytes:            u64,
    pub used_bytes:              u64,
    pub free_bytes:              u64,
    pub mem_used_percent:        f64,
    pub mem_free_percent:        f64,
    pub internal_frag_bytes:     u64,
    pub internal_frag_percent:   f64,
    pub num_free_areas:          usize,
    pub largest_free:            Units,
    pub smallest_free:           Units,
    pub avg_free_size:           f64,
    pub heap_alloc_count:        u64,
    pub heap_bytes_sum:          u64,
    pub lost_count:              u64,
    pub lost_bytes:              u64,
    pub lost_percent:            f64,
    pub peak_used_percent:       f64,
}

/// The running scalars the driver tracks tick by tick, passed to
/// [`compute`] alongside the free list whenever a snapshot is needed.
pub struct MetricsInput<'a> {
    pub unit_size:          Units,
    pub allocated_units:    Units,
    pub required_bytes_sum: u64,
    pub free_list:          &'a FreeList,
    pub heap_alloc_count:   u64,
    pub heap_bytes_sum:     u64,
    pub lost_count:         u64,
    pub lost_bytes:         u64,
    pub max_allocated_units:Units,
}

pub fn compute(input: &MetricsInput) -> MetricsSnapshot {
    let total_units = input.free_list.total_units();
    let total_bytes = (total_units * input.unit_size) as u64;
    let used_bytes = (input.allocated_units * input.unit_size) as u64;
    let free_bytes = total_bytes.saturating_sub(used_bytes);

    let internal_frag_bytes = used_bytes.saturating_sub(input.required_bytes_sum);
    let internal_frag_percent = if used_bytes > 0 {
        internal_frag_bytes as f64 / used_bytes as f64 * 100.0
    } else {
        0.0
    };

    let (mem_used_percent, mem_free_percent, lost_percent, peak_used_percent) = if total_bytes > 0 {
        (
            used_bytes as f64 / total_bytes as f64 * 100.0,
            free_bytes as f64 / total_bytes as f64 * 100.0,
            input.lost_bytes as f64 / total_bytes as f64 * 100.0,
            (input.max_allocated_units * input.unit_size) as f64 / total_bytes as f64 * 100.0,
        )
    } else {
        (0.0, 0.0, 0.0, 0.0)
    };

    MetricsSnapshot {
        total_bytes,
        used_bytes,
        free_bytes,
        mem_used_percent,
        mem_free_percent,
        internal_frag_bytes,
        internal_frag_percent,
        num_free_areas:     input.free_list.num_free_areas(),
        largest_free:       input.free_list.largest_free(),
        smallest_free:      input.free_list.smallest_free(),
        avg_free_size:      input.free_list.avg_free_size(),
        heap_alloc_count:   input.heap_alloc_count,
        heap_bytes_sum:     input.heap_bytes_sum,
        lost_count:         input.lost_count,
        lost_bytes:         input.lost_bytes,
        lost_percent,
        peak_used_percent,
    }
}
