//! CLI interface for voxloop
//!
//! A small demo surface over the library: an interactive text chat against
//! the configured providers, and provider/config inspection. Realtime audio
//! capture is left to embedding applications; the CLI drives the text paths.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::audio;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::providers::{ChatCompletionLlm, DeepgramStt, LlmProvider, StreamTts, SttProvider, TtsProvider, WhisperStt};

#[derive(Parser)]
#[command(name = "voxloop")]
#[command(about = "Realtime full-duplex voice agent runtime", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive text chat against the configured LLM (and TTS if --save-audio)
    Chat {
        /// System prompt for the assistant
        #[arg(short, long)]
        system: Option<String>,
        /// Language code (en, es, fr, de, it, pt, ja, zh)
        #[arg(short, long, default_value = "en")]
        language: String,
        /// Voice style (F1-F5, M1-M5)
        #[arg(short, long, default_value = "F1")]
        voice: String,
        /// Synthesize each reply and append it to this WAV file path prefix
        #[arg(long)]
        save_audio: Option<String>,
    },
    /// Print the configured provider names
    Providers,
    /// Print the default configuration as JSON
    Config,
}

/// Build providers from the environment:
/// - `OPENAI_API_KEY` + optional `LLM_MODEL` for the chat LLM
/// - `STT_PROVIDER` = whisper (default) | deepgram, with matching API key
/// - `TTS_WS_URL` for the streaming synthesis endpoint
fn providers_from_env() -> Result<(Arc<dyn SttProvider>, Arc<dyn LlmProvider>, Arc<dyn TtsProvider>)> {
    let openai_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

    let stt: Arc<dyn SttProvider> = match std::env::var("STT_PROVIDER").as_deref() {
        Ok("deepgram") => {
            let key = std::env::var("DEEPGRAM_API_KEY")
                .context("DEEPGRAM_API_KEY must be set for deepgram STT")?;
            Arc::new(DeepgramStt::new(key))
        }
        _ => {
            if openai_key.is_empty() {
                bail!("OPENAI_API_KEY must be set");
            }
            let model = std::env::var("STT_MODEL").unwrap_or_default();
            Arc::new(WhisperStt::new(openai_key.clone(), model))
        }
    };

    if openai_key.is_empty() {
        bail!("OPENAI_API_KEY must be set");
    }
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let llm: Arc<dyn LlmProvider> = Arc::new(ChatCompletionLlm::new(openai_key, model));

    let tts_url = std::env::var("TTS_WS_URL")
        .context("TTS_WS_URL must be set (wss://host/ws?api_key=...)")?;
    let tts: Arc<dyn TtsProvider> = Arc::new(StreamTts::new(tts_url));

    Ok((stt, llm, tts))
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Chat {
        system: None,
        language: "en".to_string(),
        voice: "F1".to_string(),
        save_audio: None,
    }) {
        Commands::Chat { system, language, voice, save_audio } => {
            chat(system, &language, &voice, save_audio).await
        }
        Commands::Providers => {
            let (stt, llm, tts) = providers_from_env()?;
            let conv = Conversation::new(stt, llm, tts);
            let names = conv.providers();
            println!("stt: {}", names.stt);
            println!("llm: {}", names.llm);
            println!("tts: {}", names.tts);
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&Config::default())?);
            Ok(())
        }
    }
}

async fn chat(
    system: Option<String>,
    language: &str,
    voice: &str,
    save_audio: Option<String>,
) -> Result<()> {
    let (stt, llm, tts) = providers_from_env()?;
    let conv = Conversation::new(stt, llm, tts);
    conv.set_language_by_name(language)?;
    conv.set_voice_by_name(voice)?;
    if let Some(prompt) = system {
        conv.set_system_prompt(prompt);
    }

    info!(session_id = %conv.session_id(), "chat session started");
    println!("voxloop chat ({}). Ctrl-D to exit.", conv.session_id());

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();
    let mut turn = 0u32;
    let cancel = CancellationToken::new();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(prefix) = &save_audio {
            let mut pcm = Vec::new();
            let mut collect = |chunk: Vec<u8>| -> Result<()> {
                pcm.extend_from_slice(&chunk);
                Ok(())
            };
            match conv.chat(&cancel, line, &mut collect).await {
                Ok(response) => {
                    println!("{}", response);
                    if !pcm.is_empty() {
                        turn += 1;
                        let path = format!("{}_{:03}.wav", prefix, turn);
                        audio::write_wav(&path, &pcm, conv.config().sample_rate)?;
                        println!("  [saved {} bytes to {}]", pcm.len(), path);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            }
        } else {
            match conv.text_only(&cancel, line).await {
                Ok(response) => println!("{}", response),
                Err(e) => eprintln!("error: {}", e),
            }
        }
    }

    println!("bye.");
    Ok(())
}
