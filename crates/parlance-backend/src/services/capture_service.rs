//! Microphone capture pipeline.
//!
//! One blocking worker owns the input stream and the segmenter: the cpal
//! callback pushes samples into a ring buffer, the worker assembles fixed
//! frames, feeds the segmenter, and hands sealed utterances to an async
//! dispatch task over a bounded channel. The worker never performs network
//! I/O and the dispatch task never touches the microphone, so slow uploads
//! cannot stall capture.

use cpal::traits::StreamTrait;
use parlance_audio::{FRAME_SAMPLES, device::HostInputDevice, samples_to_le_bytes};
use parlance_bridge::{CaptureMode, MessageFromBackend, notification::NotificationType};
use parlance_speech::{
    SAMPLE_RATE,
    segmenter::{SegmenterConfig, SegmenterEvent, Utterance, VoiceSegmenter},
    wav,
};
use ringbuf_blocking::{
    BlockingHeapRb,
    traits::{Consumer, Producer, Split},
};
use tokio::sync::{mpsc, watch};

use crate::state::CaptureHandle;

/// Ring capacity between the audio callback and the worker: three seconds
/// of headroom.
const RING_CAPACITY_SAMPLES: usize = (SAMPLE_RATE * 3) as usize;

/// Utterances queued between the capture worker and the dispatch task.
/// Utterances are processed in capture order; the bound only matters when
/// uploads fall far behind speech.
const UTTERANCE_QUEUE_DEPTH: usize = 8;

/// Level updates are posted every few frames to keep bridge traffic low
/// while still driving a responsive meter.
const LEVEL_UPDATE_INTERVAL_FRAMES: u64 = 4;

/// Handles a capture start request (see
/// [`parlance_bridge::MessageToBackend::StartCaptureRequest`]).
pub async fn handle_start_capture_request(context: super::AppContextHandle, mode: CaptureMode) {
    let (config, active_device, token_manager, already_running) = {
        let state = context.state.read().await;
        (
            state.config.clone(),
            state.active_audio_device.clone(),
            state.token_manager.clone(),
            state.capture.is_some(),
        )
    };

    if already_running {
        context
            .send_notification(NotificationType::Warning, "Capture is already running.")
            .await;
        return;
    }

    if !token_manager.is_authenticated() {
        context
            .send_notification(NotificationType::Error, "Sign in before recording.")
            .await;
        return;
    }

    let Some(device) = active_device.as_ref() else {
        context
            .send_notification(
                NotificationType::Error,
                "Select an input device before recording.",
            )
            .await;
        return;
    };
    let device = HostInputDevice::from(device.clone());

    log::info!("Starting {mode:?} capture on {device}");

    let mut segmenter_config = SegmenterConfig {
        min_energy_threshold: config.capture.min_energy_threshold,
        silence_duration_ms: config.capture.silence_duration_ms,
        min_utterance_ms: config.capture.min_utterance_ms,
    };
    if mode == CaptureMode::PushToTalk {
        // Gesture-bounded capture: silence never seals, releasing flushes.
        segmenter_config.silence_duration_ms = u64::MAX;
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let (utterance_tx, utterance_rx) = mpsc::channel(UTTERANCE_QUEUE_DEPTH);

    // The handle is stored before the worker spawns so a worker that dies
    // immediately cannot race the bookkeeping.
    {
        let mut state = context.state.write().await;
        state.capture = Some(CaptureHandle { stop: stop_tx });
    }

    tokio::spawn(dispatch_utterances(context.clone(), utterance_rx));

    let worker_context = context.clone();
    tokio::task::spawn_blocking(move || {
        capture_worker(worker_context, device, segmenter_config, stop_rx, utterance_tx);
    });

    context.send(MessageFromBackend::CaptureStarted).await;
}

/// Handles a capture stop request. The worker flushes buffered speech and
/// announces the stop itself once the signal is observed.
pub async fn handle_stop_capture_request(context: super::AppContextHandle) {
    let handle = {
        let mut state = context.state.write().await;
        state.capture.take()
    };

    match handle {
        Some(handle) => {
            let _ = handle.stop.send(true);
        }
        None => log::debug!("Stop requested with no active capture"),
    }
}

/// Blocking capture worker: drives the microphone read loop at the frame
/// cadence and feeds the segmenter.
fn capture_worker(
    context: super::AppContextHandle,
    device: HostInputDevice,
    segmenter_config: SegmenterConfig,
    stop: watch::Receiver<bool>,
    utterance_tx: mpsc::Sender<Utterance>,
) {
    let ring = BlockingHeapRb::<i16>::new(RING_CAPACITY_SAMPLES);
    let (mut producer, mut consumer) = ring.split();

    let stream = parlance_audio::device::open_capture_stream::<i16>(
        &device,
        SAMPLE_RATE,
        move |data: &[i16]| {
            producer.push_slice(data);
        },
        |error| {
            log::error!("An error occured while processing the input stream data: {error}");
        },
    );
    let stream = match stream.and_then(|stream| {
        stream.play()?;
        Ok(stream)
    }) {
        Ok(stream) => stream,
        Err(error) => {
            log::error!("Could not start the capture stream: {error}");
            context.send_blocking(MessageFromBackend::NotificationMessage(
                parlance_bridge::notification::NotificationMessage {
                    notification_type: NotificationType::Error,
                    message: format!("Could not open the microphone: {error}"),
                },
            ));
            finish_session(&context);
            return;
        }
    };

    let mut segmenter = VoiceSegmenter::new(segmenter_config);
    let mut frame = vec![0i16; FRAME_SAMPLES];
    let mut filled = 0usize;
    let mut frames_seen = 0u64;

    'capture: loop {
        while filled < FRAME_SAMPLES {
            if *stop.borrow() {
                break 'capture;
            }
            let popped = consumer.pop_slice(&mut frame[filled..]);
            if popped == 0 {
                std::thread::sleep(std::time::Duration::from_millis(2));
                continue;
            }
            filled += popped;
        }
        filled = 0;
        frames_seen += 1;

        let update = segmenter.push_frame(&samples_to_le_bytes(&frame));
        if frames_seen % LEVEL_UPDATE_INTERVAL_FRAMES == 0 {
            context.send_blocking(MessageFromBackend::InputLevelUpdate(update.energy));
        }
        if let Some(event) = update.event {
            forward_event(&utterance_tx, event);
        }
    }

    // Release the device before flushing so no more samples arrive while
    // the tail of the session is being sealed.
    drop(stream);
    if let Some(event) = segmenter.finish() {
        forward_event(&utterance_tx, event);
    }

    finish_session(&context);
}

/// Clears the capture handle and announces the stop. Also run on failed
/// starts so a dead session never blocks the next one.
fn finish_session(context: &super::AppContextHandle) {
    context.state.blocking_write().capture = None;
    context.send_blocking(MessageFromBackend::CaptureStopped);
}

fn forward_event(utterance_tx: &mpsc::Sender<Utterance>, event: SegmenterEvent) {
    match event {
        SegmenterEvent::Sealed(utterance) => {
            log::info!(
                "Sealed a {}ms utterance ({} PCM bytes)",
                utterance.duration_ms(),
                utterance.pcm.len()
            );
            if utterance_tx.blocking_send(utterance).is_err() {
                log::warn!("Dispatch queue is gone, dropping a sealed utterance");
            }
        }
        SegmenterEvent::Rejected(reason) => log::info!("Discarded a span: {reason}"),
    }
}

/// Async consumer of sealed utterances: encodes, transcribes, and forwards
/// the assistant's reply. Runs until the capture worker drops its sender.
async fn dispatch_utterances(
    context: super::AppContextHandle,
    mut utterance_rx: mpsc::Receiver<Utterance>,
) {
    let (client, languages) = {
        let state = context.state.read().await;
        (state.api_client.clone(), state.config.languages.clone())
    };

    while let Some(utterance) = utterance_rx.recv().await {
        let wav = wav::encode_utterance(&utterance.pcm);
        log::debug!(
            "Dispatching a {}ms utterance as {} bytes of WAV",
            utterance.duration_ms(),
            wav.len()
        );

        let text = match client.transcribe(wav, &languages.source).await {
            Ok(text) => text,
            Err(error) => {
                super::report_dispatch_error(&context, "transcription", error).await;
                continue;
            }
        };
        context
            .send(MessageFromBackend::UtteranceTranscribed { text: text.clone() })
            .await;

        match client.chat(&text, &languages.source, &languages.target).await {
            Ok(reply) => {
                {
                    let mut state = context.state.write().await;
                    state.conversation.push(parlance_bridge::Exchange {
                        user_text: text,
                        reply_text: reply.clone(),
                    });
                }
                context
                    .send(MessageFromBackend::AssistantReply { text: reply })
                    .await;
            }
            Err(error) => super::report_dispatch_error(&context, "chat", error).await,
        }
    }
}
