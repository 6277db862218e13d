use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

use super::SpectrumFrame;
use crate::config::SpectrumConfig;

pub struct FftAnalyser {
    bins: usize,
    fft_size: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
}

impl FftAnalyser {
    pub fn new(config: &SpectrumConfig) -> Self {
        let bins = config.bins.max(1);
        let fft_size = bins * 2;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            bins,
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; bins],
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let (a0, a1, a2) = (0.42, 0.5, 0.08);
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }

    pub fn analyse(&mut self, samples: &[f32], end: usize, frame: &mut SpectrumFrame) {
        // Window of fft_size samples ending at `end`, zero outside the track.
        let start = end as isize - self.fft_size as isize;
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let index = start + i as isize;
            let sample = if index >= 0 {
                samples.get(index as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        frame.resize(self.bins);
        let scale = 1.0 / self.fft_size as f32;
        for (k, out) in frame.bins_mut().iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let smoothed = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = smoothed;
            *out = self.to_decibels(smoothed);
        }
    }

    pub fn silence(&self, frame: &mut SpectrumFrame) {
        frame.resize(self.bins);
        frame.fill(self.min_decibels);
    }

    fn to_decibels(&self, magnitude: f32) -> f32 {
        if magnitude > 0.0 {
            (20.0 * magnitude.log10()).max(self.min_decibels)
        } else {
            self.min_decibels
        }
    }
}
