use log::trace;
use std::collections::VecDeque;

use super::SpectrumFrame;
use crate::config::BeatConfig;

#[derive(Debug, Clone)]
pub struct EnergyHistory {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl EnergyHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, energy: f32) {
        self.samples.push_back(energy);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        // A partial window averages what it holds
        let sum: f64 = self.samples.iter().map(|&e| e as f64).sum();
        (sum / self.samples.len() as f64) as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.samples.iter()
    }
}

#[derive(Debug, Clone)]
pub struct BeatDetector {
    history: EnergyHistory,
    threshold: f32,
    min_beat_interval: f64,
    last_beat_time: f64,
}

impl BeatDetector {
    pub fn new(config: &BeatConfig) -> Self {
        Self {
            history: EnergyHistory::new(config.history),
            threshold: config.threshold,
            min_beat_interval: config.interval,
            last_beat_time: 0.0,
        }
    }

    pub fn update(&mut self, spectrum: &SpectrumFrame, now: f64) -> bool {
        let energy = spectrum.energy();
        self.history.push(energy);
        let average = self.history.average();

        let loud_enough = energy > average * self.threshold;
        let can_beat = now - self.last_beat_time > self.min_beat_interval;

        if loud_enough && can_beat {
            trace!(
                "beat at {:.3}s: energy {:.1} vs average {:.1}",
                now,
                energy,
                average
            );
            self.last_beat_time = now;
            return true;
        }
        false
    }

    pub fn history(&self) -> &EnergyHistory {
        &self.history
    }

    pub fn last_beat_time(&self) -> f64 {
        self.last_beat_time
    }
}
