use glam::Vec3;

use super::color::wrap_hue;
use crate::audio::SpectrumFrame;
use crate::config::BarConfig;

/// One visual bar. Its position is fixed at creation; height and hue change every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    index: usize,
    position: Vec3,
    height: f32,
    hue: f32,
}

impl Bar {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Vertical scale applied to the bar's unit box.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Hue in [0, 1); rendered at full saturation and 0.5 lightness.
    pub fn hue(&self) -> f32 {
        self.hue
    }
}

/// Fixed row of bars laid out along x, driven by the spectrum or an idle wave.
#[derive(Debug, Clone)]
pub struct BarField {
    bars: Vec<Bar>,
    config: BarConfig,
}

impl BarField {
    pub fn new(config: &BarConfig) -> Self {
        let count = config.count;
        let bars = (0..count)
            .map(|index| Bar {
                index,
                position: Vec3::new(
                    (index as f32 - count as f32 / 2.0) * config.spacing,
                    0.0,
                    0.0,
                ),
                height: 1.0,
                hue: index as f32 / count.max(1) as f32,
            })
            .collect();

        Self {
            bars,
            config: config.clone(),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Reactive mode with a spectrum, idle mode without one.
    pub fn update(&mut self, spectrum: Option<&SpectrumFrame>, elapsed: f64) {
        match spectrum {
            Some(spectrum) => self.apply_spectrum(spectrum),
            None => self.apply_idle(elapsed),
        }
    }

    /// Bar `i` follows bin `i`; bins beyond the frame read as zero.
    pub fn apply_spectrum(&mut self, spectrum: &SpectrumFrame) {
        let offset = self.config.offset;
        let amplification = self.config.amplification;
        for bar in &mut self.bars {
            let scale = Self::reactive_scale(spectrum.get(bar.index), offset);
            bar.height = scale * amplification;
            bar.hue = wrap_hue(scale);
        }
    }

    /// Travelling sine wave that depends only on bar index and elapsed time.
    pub fn apply_idle(&mut self, elapsed: f64) {
        for i in 0..self.bars.len() {
            let (height, hue) = self.idle_state(i, elapsed);
            let bar = &mut self.bars[i];
            bar.height = height;
            bar.hue = hue;
        }
    }

    pub fn reactive_scale(value: f32, offset: f32) -> f32 {
        (value + offset) / offset
    }

    /// Idle `(height, hue)` for one bar at `elapsed` seconds.
    pub fn idle_state(&self, index: usize, elapsed: f64) -> (f32, f32) {
        let c = &self.config;
        let phase = index as f64 * c.idle_phase_step as f64 + elapsed * c.idle_speed as f64;
        let height = ((phase.sin() as f32) + c.idle_base) * c.idle_gain;
        let hue = wrap_hue(height / c.idle_hue_divisor + c.idle_hue_offset);
        (height, hue)
    }
}
