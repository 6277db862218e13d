pub mod beat_detector;
pub mod fft;
pub mod playback;

pub use beat_detector::{BeatDetector, EnergyHistory};
pub use fft::FftAnalyser;
pub use playback::{
    decode_track, track_title, AudioBackend, DecodedTrack, PlaybackController, PlaybackEvent,
    PlaybackState, RodioBackend, Toggle, TrackSink, NO_TRACK_TITLE,
};

/// Magnitude bins of one analysed audio frame, refreshed every display frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    bins: Vec<f32>,
}

impl SpectrumFrame {
    pub fn new(len: usize) -> Self {
        Self {
            bins: vec![0.0; len],
        }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn bins_mut(&mut self) -> &mut [f32] {
        &mut self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin value, with missing bins read as zero energy.
    pub fn get(&self, index: usize) -> f32 {
        self.bins.get(index).copied().unwrap_or(0.0)
    }

    /// Loudness proxy: sum of squared bin values.
    pub fn energy(&self) -> f32 {
        self.bins.iter().map(|v| v * v).sum()
    }

    pub fn fill(&mut self, value: f32) {
        self.bins.iter_mut().for_each(|b| *b = value);
    }

    pub fn resize(&mut self, len: usize) {
        self.bins.resize(len, 0.0);
    }
}

impl From<Vec<f32>> for SpectrumFrame {
    fn from(bins: Vec<f32>) -> Self {
        Self { bins }
    }
}

/// Anything able to supply the current frame's spectrum.
pub trait SpectrumSource {
    /// Overwrite `frame` with the spectrum of the audio playing right now.
    fn read_spectrum(&mut self, frame: &mut SpectrumFrame);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_is_sum_of_squares() {
        let frame = SpectrumFrame::from(vec![1.0, -2.0, 3.0]);
        assert_eq!(frame.energy(), 14.0);
        assert_eq!(SpectrumFrame::new(64).energy(), 0.0);
    }

    #[test]
    fn test_missing_bins_read_as_zero() {
        let frame = SpectrumFrame::from(vec![5.0]);
        assert_eq!(frame.get(0), 5.0);
        assert_eq!(frame.get(10), 0.0);
    }
}
