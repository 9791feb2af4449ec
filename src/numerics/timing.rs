//! Wall-clock accounting of assembly and linear solves, compiled in with the
//! `timing` feature. Without it every recorder is a plain pass-through.

use std::time::Duration;

#[cfg(feature = "timing")]
use std::cell::RefCell;

#[derive(Default, Clone, Debug)]
pub struct TimingStats {
    pub current_assembly: Vec<Duration>,
    pub heat_assembly: Vec<Duration>,
    pub linear_solves: Vec<Duration>,
    pub total_time: Duration,
}

/// Which assembly a recorded duration belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyKind {
    Current,
    Heat,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_steps(&self) -> usize {
        self.current_assembly.len().min(self.heat_assembly.len())
    }

    #[cfg(feature = "timing")]
    pub fn print_summary(&self) {
        if self.current_assembly.is_empty() && self.heat_assembly.is_empty() {
            return;
        }

        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        let avg = |v: &[Duration]| {
            if v.is_empty() {
                0.0
            } else {
                ms(v.iter().sum()) / v.len() as f64
            }
        };
        let current: Duration = self.current_assembly.iter().sum();
        let heat: Duration = self.heat_assembly.iter().sum();
        let solves: Duration = self.linear_solves.iter().sum();
        let overhead = self.total_time.saturating_sub(current + heat + solves);

        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "COUPLED SOLVER TIMING SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Total time:                    {:.3}s",
            self.total_time.as_secs_f64()
        );
        println!("{}", "-".repeat(60));
        println!(
            "  Current assembly:          {:>9.3}ms  (avg: {:>9.3}ms)",
            ms(current),
            avg(&self.current_assembly)
        );
        println!(
            "  Heat assembly:             {:>9.3}ms  (avg: {:>9.3}ms)",
            ms(heat),
            avg(&self.heat_assembly)
        );
        println!(
            "  Linear solves:             {:>9.3}ms  (avg: {:>9.3}ms)",
            ms(solves),
            avg(&self.linear_solves)
        );
        println!("{}", "=".repeat(60));
        println!("Overhead/Other:                {:>9.3}ms", ms(overhead));
        println!(
            "Counts:                        {} steps, {} lin.solve\n",
            self.n_steps(),
            self.linear_solves.len()
        );
    }

    #[cfg(not(feature = "timing"))]
    pub fn print_summary(&self) {}
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::new());
}

#[cfg(feature = "timing")]
pub fn reset_timing() {
    TIMING_STATS.with(|stats| *stats.borrow_mut() = TimingStats::new());
}

#[cfg(not(feature = "timing"))]
pub fn reset_timing() {}

#[cfg(feature = "timing")]
pub fn record_assembly<F, R>(kind: AssemblyKind, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| {
        let mut stats = stats.borrow_mut();
        match kind {
            AssemblyKind::Current => stats.current_assembly.push(elapsed),
            AssemblyKind::Heat => stats.heat_assembly.push(elapsed),
        }
    });
    result
}

#[cfg(not(feature = "timing"))]
pub fn record_assembly<F, R>(_kind: AssemblyKind, f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn record_linear_solve<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMING_STATS.with(|stats| stats.borrow_mut().linear_solves.push(elapsed));
    result
}

#[cfg(not(feature = "timing"))]
pub fn record_linear_solve<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    TIMING_STATS.with(|stats| {
        let mut s = stats.borrow_mut();
        s.total_time = total_time;
        s.clone()
    })
}

#[cfg(not(feature = "timing"))]
pub fn finalize_timing(_total_time: Duration) -> TimingStats {
    TimingStats::new()
}

pub fn finalize_and_print(total_time: Duration) {
    finalize_timing(total_time).print_summary();
}
