//! Minimal terminal stand-in for the UI collaborator.
//!
//! The real product front end is a mobile shell; this harness drives the
//! same bridge protocol from stdin so the whole pipeline (login, capture,
//! dispatch, assistant calls) can be exercised headlessly.

use std::io::Write;
use std::thread;

use parlance_bridge::{CaptureMode, MessageFromBackend, MessageToBackend};
use tokio::sync::mpsc::{Receiver, Sender};

const USAGE: &str = "Commands: login <identity> <device-token> | logout | devices | \
device <id> | start | ptt | stop | chat <text> | translate <text> | \
visual <image-path> <query> | say <text> | log | config | quit";

/// Runs the interactive command loop until `quit` or end of input.
pub fn run(rx: Receiver<MessageFromBackend>, tx: Sender<MessageToBackend>) {
    let printer = thread::spawn(move || print_backend_messages(rx));

    println!("{USAGE}");
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        let read = stdin.read_line(&mut line).expect("failed to read stdin");
        if read == 0 {
            break;
        }

        let trimmed = line.trim();
        let (command, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
        let message = match command {
            "" => continue,
            "quit" | "exit" => break,
            "login" => match rest.split_once(' ') {
                Some((identity, device_token)) => MessageToBackend::LoginRequest {
                    identity: identity.to_string(),
                    device_token: device_token.to_string(),
                },
                None => {
                    println!("[USAGE] login <identity> <device-token>");
                    continue;
                }
            },
            "logout" => MessageToBackend::LogoutRequest,
            "devices" => MessageToBackend::AudioDevicesListRequest,
            "device" if !rest.is_empty() => MessageToBackend::SelectAudioDevice(rest.to_string()),
            "start" => MessageToBackend::StartCaptureRequest(CaptureMode::VoiceActivated),
            "ptt" => MessageToBackend::StartCaptureRequest(CaptureMode::PushToTalk),
            "stop" => MessageToBackend::StopCaptureRequest,
            "chat" if !rest.is_empty() => MessageToBackend::ChatRequest(rest.to_string()),
            "translate" if !rest.is_empty() => {
                MessageToBackend::TranslateRequest(vec![rest.to_string()])
            }
            "visual" => match rest.split_once(' ') {
                Some((path, query)) => match std::fs::read(path) {
                    Ok(image) => MessageToBackend::VisualQueryRequest {
                        image,
                        query: query.to_string(),
                    },
                    Err(error) => {
                        println!("[ERROR] could not read {path}: {error}");
                        continue;
                    }
                },
                None => {
                    println!("[USAGE] visual <image-path> <query>");
                    continue;
                }
            },
            "say" if !rest.is_empty() => MessageToBackend::SpeakRequest(rest.to_string()),
            "log" => MessageToBackend::ConversationLogRequest,
            "config" => MessageToBackend::ConfigurationRequest,
            _ => {
                println!("[USAGE] unknown command: {trimmed}");
                continue;
            }
        };

        if tx.blocking_send(message).is_err() {
            // Backend loop is gone; nothing left to drive.
            break;
        }
    }

    // A still-running capture session would keep the bridge alive past the
    // end of input; stopping it lets the backend wind down cleanly.
    let _ = tx.blocking_send(MessageToBackend::StopCaptureRequest);
    drop(tx);
    printer.join().expect("printer thread panicked");
}

fn print_backend_messages(mut rx: Receiver<MessageFromBackend>) {
    while let Some(message) = rx.blocking_recv() {
        match message {
            MessageFromBackend::NotificationMessage(notification) => {
                println!(
                    "[{:?}] {}",
                    notification.notification_type, notification.message
                );
            }
            MessageFromBackend::ConfigurationResponse(config) => {
                println!("[CONFIG] {config:#?}");
            }
            MessageFromBackend::AudioDevicesListResponse(devices) => {
                for device in devices {
                    let marker = if device.selected { "*" } else { " " };
                    println!("[DEVICE]{marker} {} ({})", device.description, device.id);
                }
            }
            MessageFromBackend::AuthStateUpdate { authenticated } => {
                println!("[AUTH] authenticated = {authenticated}");
            }
            MessageFromBackend::CaptureStarted => println!("[CAPTURE] started"),
            MessageFromBackend::CaptureStopped => println!("[CAPTURE] stopped"),
            MessageFromBackend::InputLevelUpdate(level) => {
                print!("\r[MIC] {level:>5.2}");
                let _ = std::io::stdout().flush();
            }
            MessageFromBackend::UtteranceTranscribed { text } => {
                println!("\n[YOU] {text}");
            }
            MessageFromBackend::AssistantReply { text } => {
                println!("[ASSISTANT] {text}");
            }
            MessageFromBackend::TranslationResponse(translations) => {
                println!("[TRANSLATION] {}", translations.join(" | "));
            }
            MessageFromBackend::VisualQueryResponse { answer } => {
                println!("[VISUAL] {answer}");
            }
            MessageFromBackend::SpeechSynthesized(audio) => {
                println!("[SPEECH] received {} bytes of audio", audio.len());
            }
            MessageFromBackend::ConversationLogResponse(exchanges) => {
                for exchange in exchanges {
                    println!("[LOG] you: {}", exchange.user_text);
                    println!("[LOG] assistant: {}", exchange.reply_text);
                }
            }
        }
    }
}
