use crossbeam_channel::{Receiver, TryRecvError};
use log::{info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{FftAnalyser, SpectrumFrame, SpectrumSource};
use crate::config::VisualizerConfig;
use crate::error::PlaybackError;
use crate::frame_driver::AudioInput;

pub const NO_TRACK_TITLE: &str = "No song playing";

/// Lifecycle of the single playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Decoding,
    Ready,
    Playing,
    Stopped,
    Ended,
}

/// Notifications for the UI glue, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Loaded { title: String },
    Started,
    Stopped,
    Ended,
    Disposed,
    DecodeFailed { title: String, reason: String },
    /// The track loaded but the output refused to start it
    StartFailed { reason: String },
}

/// Outcome of the play/stop button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
    /// Nothing loaded; the caller should ask for a file
    NoTrack,
}

/// A fully decoded track: interleaved samples for output, a mono mix for analysis.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    pub title: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved: Vec<f32>,
    pub mono: Vec<f32>,
}

impl DecodedTrack {
    pub fn from_interleaved(
        title: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        interleaved: Vec<f32>,
    ) -> Self {
        let width = channels.max(1) as usize;
        let mono = interleaved
            .chunks(width)
            .map(|chunk| chunk.iter().sum::<f32>() / width as f32)
            .collect();

        Self {
            title: title.into(),
            sample_rate,
            channels,
            interleaved,
            mono,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.mono.len() as f64 / self.sample_rate as f64)
    }
}

/// Decode an in-memory audio file (any format rodio/symphonia understands).
pub fn decode_track(title: &str, bytes: Vec<u8>) -> Result<DecodedTrack, PlaybackError> {
    let decode_error = |reason: String| PlaybackError::Decode {
        title: title.to_string(),
        reason,
    };

    let source = Decoder::new(Cursor::new(bytes)).map_err(|e| decode_error(e.to_string()))?;
    let sample_rate = source.sample_rate();
    let channels = source.channels();
    if channels == 0 || sample_rate == 0 {
        return Err(decode_error("stream reports no channels".to_string()));
    }

    let interleaved: Vec<f32> = source.convert_samples::<f32>().collect();
    if interleaved.is_empty() {
        return Err(decode_error("no audio samples".to_string()));
    }

    Ok(DecodedTrack::from_interleaved(
        title,
        sample_rate,
        channels,
        interleaved,
    ))
}

/// Output side of one loaded track.
pub trait TrackSink {
    /// Begin playing from the start of the track.
    fn start(&mut self) -> Result<(), PlaybackError>;

    fn stop(&mut self);

    /// True once every queued sample has been played (or nothing is queued).
    fn is_finished(&self) -> bool;

    /// Playhead measured from the last `start`.
    fn position(&self) -> Duration;
}

/// Factory for track sinks; owns the output device.
pub trait AudioBackend {
    type Sink: TrackSink;

    fn open(&mut self, track: Arc<DecodedTrack>) -> Result<Self::Sink, PlaybackError>;
}

pub struct RodioBackend {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn new() -> Result<Self, PlaybackError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;
        Ok(Self {
            stream,
            stream_handle,
        })
    }
}

impl AudioBackend for RodioBackend {
    type Sink = RodioSink;

    fn open(&mut self, track: Arc<DecodedTrack>) -> Result<RodioSink, PlaybackError> {
        Ok(RodioSink {
            stream_handle: self.stream_handle.clone(),
            track,
            sink: None,
            started_at: None,
        })
    }
}

pub struct RodioSink {
    stream_handle: OutputStreamHandle,
    track: Arc<DecodedTrack>,
    sink: Option<Sink>,
    started_at: Option<Instant>,
}

impl TrackSink for RodioSink {
    fn start(&mut self) -> Result<(), PlaybackError> {
        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        sink.append(SamplesBuffer::new(
            self.track.channels,
            self.track.sample_rate,
            self.track.interleaved.clone(),
        ));
        sink.play();

        if let Some(previous) = self.sink.replace(sink) {
            previous.stop();
        }
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.started_at = None;
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().map_or(true, |sink| sink.empty())
    }

    fn position(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

struct PlaybackSession<S> {
    track: Arc<DecodedTrack>,
    sink: S,
}

struct PendingDecode {
    title: String,
    receiver: Receiver<Result<DecodedTrack, PlaybackError>>,
}

/// Display title for a file on disk.
pub fn track_title(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Owns load/play/stop/dispose for at most one track at a time.
///
/// Decoding happens on a worker thread; `poll` must be called once per frame
/// to pick up the result and to notice the end of the track. The current
/// track keeps playing until its replacement has decoded.
pub struct PlaybackController<B: AudioBackend> {
    backend: B,
    autoplay: bool,
    state: PlaybackState,
    session: Option<PlaybackSession<B::Sink>>,
    pending: Option<PendingDecode>,
    events: Vec<PlaybackEvent>,
    analyser: FftAnalyser,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(backend: B, config: &VisualizerConfig) -> Self {
        Self {
            backend,
            autoplay: config.playback.autoplay,
            state: PlaybackState::Idle,
            session: None,
            pending: None,
            events: Vec::new(),
            analyser: FftAnalyser::new(&config.spectrum),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn has_track(&self) -> bool {
        self.session.is_some()
    }

    /// A load is in flight, whether or not a track is still playing.
    pub fn is_decoding(&self) -> bool {
        self.pending.is_some()
    }

    pub fn title(&self) -> &str {
        self.session
            .as_ref()
            .map_or(NO_TRACK_TITLE, |s| s.track.title.as_str())
    }

    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start decoding `bytes` in the background.
    pub fn load(&mut self, title: impl Into<String>, bytes: Vec<u8>) {
        let title = title.into();
        let worker_title = title.clone();
        self.spawn_decode(title, move || decode_track(&worker_title, bytes));
    }

    /// Read and decode a file in the background.
    pub fn load_file(&mut self, path: PathBuf) {
        let title = track_title(&path);
        let worker_title = title.clone();
        self.spawn_decode(title, move || {
            let bytes = std::fs::read(&path).map_err(|e| PlaybackError::Read {
                title: worker_title.clone(),
                reason: e.to_string(),
            })?;
            decode_track(&worker_title, bytes)
        });
    }

    /// Install an already decoded track, bypassing the worker thread.
    pub fn load_decoded(&mut self, track: DecodedTrack) {
        self.pending = None;
        self.install(track);
    }

    fn spawn_decode<F>(&mut self, title: String, job: F)
    where
        F: FnOnce() -> Result<DecodedTrack, PlaybackError> + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let spawned = std::thread::Builder::new()
            .name("track-decode".to_string())
            .spawn(move || {
                // The receiver is gone if the load was cancelled; nothing to report then.
                let _ = sender.send(job());
            });

        match spawned {
            Ok(_) => {
                info!("Decoding '{}'", title);
                self.pending = Some(PendingDecode { title, receiver });
                if self.session.is_none() {
                    self.state = PlaybackState::Decoding;
                }
            }
            Err(e) => self.fail_decode(title, e.to_string()),
        }
    }

    /// Collect a finished decode and detect end-of-track.
    pub fn poll(&mut self) {
        let received = match &self.pending {
            Some(pending) => match pending.receiver.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(PlaybackError::Decode {
                    title: pending.title.clone(),
                    reason: "decoder thread exited".to_string(),
                })),
            },
            None => None,
        };

        if let Some(result) = received {
            let pending = self.pending.take();
            match result {
                Ok(track) => self.install(track),
                Err(e) => {
                    let title = pending.map(|p| p.title).unwrap_or_default();
                    self.fail_decode(title, e.to_string());
                }
            }
        }

        let finished = self.state == PlaybackState::Playing
            && self.session.as_ref().map_or(false, |s| s.sink.is_finished());
        if finished {
            self.finish_track();
        }
    }

    pub fn start(&mut self) -> Result<(), PlaybackError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.sink.start()?;
        self.analyser.reset();
        self.state = PlaybackState::Playing;
        self.events.push(PlaybackEvent::Started);
        info!("Playback started: {}", session.track.title);
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.sink.stop();
            self.state = PlaybackState::Stopped;
            self.events.push(PlaybackEvent::Stopped);
            info!("Playback stopped");
        }
    }

    /// Play/stop button: toggles a loaded track, reports when nothing is loaded.
    pub fn toggle(&mut self) -> Result<Toggle, PlaybackError> {
        if self.session.is_none() {
            return Ok(Toggle::NoTrack);
        }
        if self.state == PlaybackState::Playing {
            self.stop();
            Ok(Toggle::Stopped)
        } else {
            self.start()?;
            Ok(Toggle::Started)
        }
    }

    /// Stop and release the current track and cancel any pending decode.
    pub fn delete(&mut self) {
        self.pending = None;
        self.release_session();
        self.state = PlaybackState::Idle;
        self.events.push(PlaybackEvent::Disposed);
    }

    /// Swap in a decoded track; the previous session is released only once
    /// the new sink is open.
    fn install(&mut self, track: DecodedTrack) {
        let title = track.title.clone();
        let track = Arc::new(track);
        match self.backend.open(Arc::clone(&track)) {
            Ok(sink) => {
                self.release_session();
                info!(
                    "Loaded '{}' ({}Hz, {} channels, {:.1}s)",
                    title,
                    track.sample_rate,
                    track.channels,
                    track.duration().as_secs_f32()
                );
                self.session = Some(PlaybackSession { track, sink });
                self.state = PlaybackState::Ready;
                self.events.push(PlaybackEvent::Loaded { title });
                if self.autoplay {
                    if let Err(e) = self.start() {
                        warn!("Could not start playback: {}", e);
                        self.events.push(PlaybackEvent::StartFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }
            Err(e) => self.fail_decode(title, e.to_string()),
        }
    }

    /// Report a failed load. A track that is already loaded stays as it was.
    fn fail_decode(&mut self, title: String, reason: String) {
        warn!("Failed to load '{}': {}", title, reason);
        if self.session.is_none() {
            self.state = PlaybackState::Idle;
        }
        self.events
            .push(PlaybackEvent::DecodeFailed { title, reason });
    }

    fn finish_track(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.sink.stop();
            info!("Track ended: {}", session.track.title);
        }
        self.state = if self.pending.is_some() {
            PlaybackState::Decoding
        } else {
            PlaybackState::Ended
        };
        self.events.push(PlaybackEvent::Ended);
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.sink.stop();
            info!("Disposed '{}'", session.track.title);
        }
    }
}

impl<B: AudioBackend> SpectrumSource for PlaybackController<B> {
    fn read_spectrum(&mut self, frame: &mut SpectrumFrame) {
        match (&self.session, self.state) {
            (Some(session), PlaybackState::Playing) => {
                let position = session.sink.position().as_secs_f64();
                let end = (position * session.track.sample_rate as f64) as usize;
                self.analyser.analyse(&session.track.mono, end, frame);
            }
            _ => self.analyser.silence(frame),
        }
    }
}

impl<B: AudioBackend> AudioInput for PlaybackController<B> {
    fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing && self.session.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    pub(crate) struct SinkCounters {
        pub starts: Cell<usize>,
        pub stops: Cell<usize>,
        pub finished: Cell<bool>,
        pub position: Cell<Duration>,
        pub fail_start: Cell<bool>,
    }

    pub(crate) struct MockSink {
        counters: Rc<SinkCounters>,
    }

    impl TrackSink for MockSink {
        fn start(&mut self) -> Result<(), PlaybackError> {
            if self.counters.fail_start.get() {
                return Err(PlaybackError::Output("device busy".to_string()));
            }
            self.counters.starts.set(self.counters.starts.get() + 1);
            self.counters.finished.set(false);
            Ok(())
        }

        fn stop(&mut self) {
            self.counters.stops.set(self.counters.stops.get() + 1);
        }

        fn is_finished(&self) -> bool {
            self.counters.finished.get()
        }

        fn position(&self) -> Duration {
            self.counters.position.get()
        }
    }

    #[derive(Default)]
    pub(crate) struct MockBackend {
        pub counters: Rc<SinkCounters>,
        pub fail_open: bool,
    }

    impl AudioBackend for MockBackend {
        type Sink = MockSink;

        fn open(&mut self, _track: Arc<DecodedTrack>) -> Result<MockSink, PlaybackError> {
            if self.fail_open {
                return Err(PlaybackError::Output("no device".to_string()));
            }
            Ok(MockSink {
                counters: Rc::clone(&self.counters),
            })
        }
    }

    pub(crate) fn controller() -> (PlaybackController<MockBackend>, Rc<SinkCounters>) {
        let backend = MockBackend::default();
        let counters = Rc::clone(&backend.counters);
        (
            PlaybackController::new(backend, &VisualizerConfig::default()),
            counters,
        )
    }

    pub(crate) fn test_track(seconds: f32) -> DecodedTrack {
        let rate = 8000;
        let samples = (0..(rate as f32 * seconds) as usize)
            .map(|n| (n as f32 * 0.05).sin() * 0.5)
            .collect();
        DecodedTrack::from_interleaved("test.wav", rate, 1, samples)
    }

    /// 16-bit PCM mono WAV file.
    fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        bytes
    }

    fn poll_until_settled(controller: &mut PlaybackController<MockBackend>) {
        for _ in 0..400 {
            controller.poll();
            if !controller.is_decoding() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("decode did not finish");
    }

    #[test]
    fn test_mono_mix_averages_channels() {
        let track = DecodedTrack::from_interleaved("s", 4, 2, vec![1.0, 0.0, 0.5, 0.5]);
        assert_eq!(track.mono, vec![0.5, 0.5]);
        assert_eq!(track.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_decode_wav_bytes() {
        let samples: Vec<i16> = (0..800).map(|n| ((n % 50) * 400) as i16).collect();
        let track = decode_track("tone.wav", wav_bytes(&samples, 8000)).unwrap();
        assert_eq!(track.sample_rate, 8000);
        assert_eq!(track.channels, 1);
        assert_eq!(track.mono.len(), 800);
        assert_eq!(track.title, "tone.wav");
    }

    #[test]
    fn test_decode_garbage_is_rejected() {
        let result = decode_track("junk.mp3", vec![0x13; 64]);
        assert!(matches!(result, Err(PlaybackError::Decode { .. })));
    }

    #[test]
    fn test_async_load_autoplays() {
        let (mut controller, counters) = controller();
        let samples: Vec<i16> = vec![1000; 4000];
        controller.load("song.wav", wav_bytes(&samples, 8000));
        assert_eq!(controller.state(), PlaybackState::Decoding);
        assert!(!controller.is_playing());

        poll_until_settled(&mut controller);
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.title(), "song.wav");
        assert_eq!(counters.starts.get(), 1);
        assert_eq!(
            controller.drain_events(),
            vec![
                PlaybackEvent::Loaded {
                    title: "song.wav".to_string()
                },
                PlaybackEvent::Started
            ]
        );
    }

    #[test]
    fn test_failed_decode_leaves_no_session() {
        let (mut controller, counters) = controller();
        controller.load("broken.ogg", vec![1, 2, 3, 4]);
        poll_until_settled(&mut controller);

        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.has_track());
        assert!(!controller.is_playing());
        assert_eq!(controller.title(), NO_TRACK_TITLE);
        assert_eq!(counters.starts.get(), 0);
        assert!(matches!(
            controller.drain_events().as_slice(),
            [PlaybackEvent::DecodeFailed { .. }]
        ));
    }

    #[test]
    fn test_failed_decode_keeps_current_track() {
        let (mut controller, counters) = controller();
        controller.load_decoded(test_track(1.0));
        controller.drain_events();

        controller.load("broken.ogg", vec![1, 2, 3, 4]);
        assert!(controller.is_decoding());
        assert_eq!(controller.state(), PlaybackState::Playing);
        poll_until_settled(&mut controller);

        assert!(controller.has_track());
        assert!(controller.is_playing());
        assert_eq!(controller.title(), "test.wav");
        assert_eq!(counters.stops.get(), 0);
        assert!(matches!(
            controller.drain_events().as_slice(),
            [PlaybackEvent::DecodeFailed { .. }]
        ));
    }

    #[test]
    fn test_current_track_plays_until_replacement_decodes() {
        let (mut controller, counters) = controller();
        controller.load_decoded(test_track(1.0));
        controller.load("next.wav", wav_bytes(&[500; 800], 8000));
        assert!(controller.is_playing());
        assert_eq!(counters.stops.get(), 0);

        poll_until_settled(&mut controller);
        assert_eq!(controller.title(), "next.wav");
        assert_eq!(counters.stops.get(), 1);
        assert_eq!(counters.starts.get(), 2);
    }

    #[test]
    fn test_load_file_reads_on_worker() {
        let path = std::env::temp_dir().join(format!("beatfield-{}.wav", std::process::id()));
        std::fs::write(&path, wav_bytes(&[1000; 4000], 8000)).unwrap();

        let (mut controller, _counters) = controller();
        controller.load_file(path.clone());
        poll_until_settled(&mut controller);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.title(), track_title(&path));
    }

    #[test]
    fn test_missing_file_reports_read_failure() {
        let (mut controller, _counters) = controller();
        controller.load_file(PathBuf::from("/nonexistent/beatfield/missing.mp3"));
        poll_until_settled(&mut controller);

        assert_eq!(controller.state(), PlaybackState::Idle);
        match controller.drain_events().as_slice() {
            [PlaybackEvent::DecodeFailed { title, reason }] => {
                assert_eq!(title, "missing.mp3");
                assert!(reason.starts_with("cannot read"));
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_autoplay_failure_is_reported() {
        let (mut controller, counters) = controller();
        counters.fail_start.set(true);
        controller.load_decoded(test_track(1.0));

        assert_eq!(controller.state(), PlaybackState::Ready);
        assert!(controller.has_track());
        assert_eq!(
            controller.drain_events(),
            vec![
                PlaybackEvent::Loaded {
                    title: "test.wav".to_string()
                },
                PlaybackEvent::StartFailed {
                    reason: "audio output error: device busy".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_backend_failure_leaves_no_session() {
        let backend = MockBackend {
            fail_open: true,
            ..Default::default()
        };
        let mut controller = PlaybackController::new(backend, &VisualizerConfig::default());
        controller.load_decoded(test_track(0.5));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.has_track());
    }

    #[test]
    fn test_toggle_cycles_and_reports_missing_track() {
        let (mut controller, counters) = controller();
        assert_eq!(controller.toggle().unwrap(), Toggle::NoTrack);

        controller.load_decoded(test_track(1.0));
        assert_eq!(controller.state(), PlaybackState::Playing);

        assert_eq!(controller.toggle().unwrap(), Toggle::Stopped);
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(!controller.is_playing());
        assert_eq!(counters.stops.get(), 1);

        assert_eq!(controller.toggle().unwrap(), Toggle::Started);
        assert!(controller.is_playing());
        assert_eq!(counters.starts.get(), 2);
    }

    #[test]
    fn test_end_of_track_disposes_session() {
        let (mut controller, counters) = controller();
        controller.load_decoded(test_track(1.0));
        controller.drain_events();

        counters.finished.set(true);
        controller.poll();

        assert_eq!(controller.state(), PlaybackState::Ended);
        assert!(!controller.has_track());
        assert_eq!(controller.title(), NO_TRACK_TITLE);
        assert_eq!(controller.drain_events(), vec![PlaybackEvent::Ended]);
        assert_eq!(controller.toggle().unwrap(), Toggle::NoTrack);
    }

    #[test]
    fn test_stopped_track_is_not_ended_by_poll() {
        let (mut controller, counters) = controller();
        controller.load_decoded(test_track(1.0));
        controller.stop();
        counters.finished.set(true);
        controller.poll();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(controller.has_track());
    }

    #[test]
    fn test_delete_releases_synchronously() {
        let (mut controller, counters) = controller();
        controller.load_decoded(test_track(1.0));
        controller.delete();

        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.has_track());
        assert!(!controller.is_playing());
        assert_eq!(counters.stops.get(), 1);
        assert_eq!(controller.drain_events().last(), Some(&PlaybackEvent::Disposed));
    }

    #[test]
    fn test_delete_cancels_pending_decode() {
        let (mut controller, _counters) = controller();
        controller.load("slow.wav", wav_bytes(&[0; 16], 8000));
        controller.delete();
        std::thread::sleep(Duration::from_millis(20));
        controller.poll();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.has_track());
    }

    #[test]
    fn test_loading_replaces_previous_track() {
        let (mut controller, counters) = controller();
        controller.load_decoded(test_track(1.0));
        let mut second = test_track(2.0);
        second.title = "second.wav".to_string();
        controller.load_decoded(second);

        assert_eq!(controller.title(), "second.wav");
        assert_eq!(counters.stops.get(), 1);
        assert_eq!(counters.starts.get(), 2);
    }

    #[test]
    fn test_spectrum_is_silent_unless_playing() {
        let (mut controller, counters) = controller();
        let mut frame = SpectrumFrame::default();
        controller.read_spectrum(&mut frame);
        assert_eq!(frame.len(), 64);
        assert!(frame.bins().iter().all(|&db| db == -140.0));

        controller.load_decoded(test_track(1.0));
        counters.position.set(Duration::from_millis(500));
        controller.read_spectrum(&mut frame);
        assert!(frame.bins().iter().any(|&db| db > -140.0));
    }
}
