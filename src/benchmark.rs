//! SPI latency benchmarking: sequential timed exchanges with a fixed pause
//! between iterations, summarized as min/max/mean per direction.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::ProgressBar;

use crate::spi::SpiController;

#[derive(Debug, Clone, Copy)]
pub struct BenchReport {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
}

pub fn summarize(samples: &[Duration]) -> Option<BenchReport> {
    let min = *samples.iter().min()?;
    let max = *samples.iter().max()?;
    let total: Duration = samples.iter().sum();
    let mean = total / samples.len() as u32;
    Some(BenchReport { min, max, mean })
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Run `ops` timed writes followed by `ops` timed reads, pausing `delay`
/// between iterations so the device under test is never saturated. Each
/// exchange is a single blocking call; the loop is only interruptible
/// between them.
pub fn spi_rd_wr(controller: &mut SpiController, ops: usize, delay: Duration) -> Result<()> {
    let start = Instant::now();
    controller.write(0, false)?;
    println!("Initial Write Operation = {:.3} ms", ms(start.elapsed()));

    println!("Benchmarking SPI Writes.");
    let mut write_times = Vec::with_capacity(ops);
    let bar = ProgressBar::new(ops as u64);
    for _ in 0..ops {
        let start = Instant::now();
        controller.write(0, false)?;
        write_times.push(start.elapsed());
        bar.inc(1);
        thread::sleep(delay);
    }
    bar.finish_and_clear();

    println!("Benchmarking SPI Reads.");
    let mut read_times = Vec::with_capacity(ops);
    let bar = ProgressBar::new(ops as u64);
    for _ in 0..ops {
        let start = Instant::now();
        controller.read(0, false)?;
        read_times.push(start.elapsed());
        bar.inc(1);
        thread::sleep(delay);
    }
    bar.finish_and_clear();

    println!();
    println!("RESULTS SUMMARY");
    println!("-------------------");
    if let Some(report) = summarize(&write_times) {
        println!(
            "WRITES: Min = {:.3} ms, Max = {:.3} ms, Avg = {:.3} ms",
            ms(report.min),
            ms(report.max),
            ms(report.mean)
        );
    }
    if let Some(report) = summarize(&read_times) {
        println!(
            "READS:  Min = {:.3} ms, Max = {:.3} ms, Avg = {:.3} ms",
            ms(report.min),
            ms(report.max),
            ms(report.mean)
        );
    }
    println!();
    Ok(())
}
