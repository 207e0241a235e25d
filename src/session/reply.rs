//! Streaming reply pipe
//!
//! Framing per reply: `stream_start`, then for each unit `unit_start`, its
//! audio chunks in order and `unit_complete`, then `stream_complete`. Every
//! unit gets both markers even when synthesis yields nothing or fails.

use futures::StreamExt;
use tokio::sync::mpsc;

use super::protocol::{Outbound, ServerMessage};
use crate::agent::filter::split_sentences;
use crate::voice::Synthesizer;
use crate::{Error, Result};

/// How a reply is cut into synthesis units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSplit {
    /// The whole reply is one unit
    #[default]
    Whole,
    /// One unit per sentence
    Sentences,
}

/// What was sent for one reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub units: usize,
    pub chunks: usize,
    pub bytes: usize,
    pub failed_units: usize,
}

/// Cut `text` into speakable units
#[must_use]
pub fn split_units(text: &str, split: UnitSplit) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    match split {
        UnitSplit::Whole => vec![text.to_string()],
        UnitSplit::Sentences => split_sentences(text)
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

async fn send(outbound: &mpsc::Sender<Outbound>, item: impl Into<Outbound>) -> Result<()> {
    outbound
        .send(item.into())
        .await
        .map_err(|_| Error::ChannelClosed)
}

/// Synthesize `text` and push it to the client in generation order
///
/// # Errors
///
/// Returns `Error::ChannelClosed` if the client went away mid-stream.
/// Synthesis failures are reported to the client, not returned.
pub async fn stream_reply(
    synthesizer: &dyn Synthesizer,
    text: &str,
    language: &str,
    split: UnitSplit,
    outbound: &mpsc::Sender<Outbound>,
) -> Result<StreamSummary> {
    let units = split_units(text, split);
    let mut summary = StreamSummary {
        units: units.len(),
        ..StreamSummary::default()
    };

    send(outbound, ServerMessage::StreamStart { units: units.len() }).await?;

    for (index, unit) in units.iter().enumerate() {
        send(
            outbound,
            ServerMessage::UnitStart {
                index,
                text: unit.clone(),
            },
        )
        .await?;

        match synthesizer.synthesize_stream(unit, language).await {
            Ok(mut chunks) => {
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(audio) if audio.is_empty() => {}
                        Ok(audio) => {
                            summary.chunks += 1;
                            summary.bytes += audio.len();
                            send(outbound, Outbound::Audio(audio)).await?;
                        }
                        Err(e) => {
                            tracing::warn!(index, error = %e, "synthesis stream failed");
                            summary.failed_units += 1;
                            send(outbound, ServerMessage::error("synthesis_failed", e.to_string()))
                                .await?;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "synthesis failed");
                summary.failed_units += 1;
                send(outbound, ServerMessage::error("synthesis_failed", e.to_string())).await?;
            }
        }

        send(outbound, ServerMessage::UnitComplete { index }).await?;
    }

    send(outbound, ServerMessage::StreamComplete { units: units.len() }).await?;

    tracing::debug!(
        units = summary.units,
        chunks = summary.chunks,
        bytes = summary.bytes,
        failed = summary.failed_units,
        "reply streamed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::voice::{AudioChunkStream, tts::chunked};

    /// Speaks every unit as its bytes, failing on units containing "fail"
    struct EchoSynthesizer {
        chunk_bytes: usize,
    }

    #[async_trait]
    impl Synthesizer for EchoSynthesizer {
        async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
            if text.contains("fail") {
                return Err(Error::Tts("provider down".to_string()));
            }
            if text.contains("silent") {
                return Ok(Vec::new());
            }
            Ok(text.as_bytes().to_vec())
        }

        async fn synthesize_stream(&self, text: &str, language: &str) -> Result<AudioChunkStream> {
            let audio = self.synthesize(text, language).await?;
            Ok(chunked(audio, self.chunk_bytes))
        }
    }

    async fn collect(text: &str, split: UnitSplit) -> (StreamSummary, Vec<Outbound>) {
        let (tx, mut rx) = mpsc::channel(256);
        let synth = EchoSynthesizer { chunk_bytes: 4 };
        let summary = stream_reply(&synth, text, "ta-IN", split, &tx).await.unwrap();
        drop(tx);
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        (summary, out)
    }

    fn message(item: &Outbound) -> Option<&ServerMessage> {
        match item {
            Outbound::Message(m) => Some(m),
            Outbound::Audio(_) => None,
        }
    }

    #[tokio::test]
    async fn whole_reply_is_framed_and_ordered() {
        let (summary, out) = collect("Added two idli.", UnitSplit::Whole).await;

        assert_eq!(summary.units, 1);
        assert_eq!(message(&out[0]), Some(&ServerMessage::StreamStart { units: 1 }));
        assert!(matches!(message(&out[1]), Some(ServerMessage::UnitStart { index: 0, .. })));

        let audio: Vec<u8> = out
            .iter()
            .filter_map(|o| match o {
                Outbound::Audio(a) => Some(a.clone()),
                Outbound::Message(_) => None,
            })
            .flatten()
            .collect();
        assert_eq!(audio, b"Added two idli.");

        let n = out.len();
        assert_eq!(message(&out[n - 2]), Some(&ServerMessage::UnitComplete { index: 0 }));
        assert_eq!(message(&out[n - 1]), Some(&ServerMessage::StreamComplete { units: 1 }));
    }

    #[tokio::test]
    async fn empty_unit_still_gets_markers() {
        let (summary, out) = collect("silent", UnitSplit::Whole).await;

        assert_eq!(summary.chunks, 0);
        let messages: Vec<_> = out.iter().filter_map(message).cloned().collect();
        assert_eq!(
            messages,
            vec![
                ServerMessage::StreamStart { units: 1 },
                ServerMessage::UnitStart {
                    index: 0,
                    text: "silent".to_string()
                },
                ServerMessage::UnitComplete { index: 0 },
                ServerMessage::StreamComplete { units: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported_and_stream_closes() {
        let (summary, out) = collect("This will fail. Next one works.", UnitSplit::Sentences).await;

        assert_eq!(summary.units, 2);
        assert_eq!(summary.failed_units, 1);
        let messages: Vec<_> = out.iter().filter_map(message).cloned().collect();
        assert!(matches!(&messages[2], ServerMessage::Error { code, .. } if code == "synthesis_failed"));
        assert_eq!(messages[3], ServerMessage::UnitComplete { index: 0 });
        assert_eq!(messages.last(), Some(&ServerMessage::StreamComplete { units: 2 }));
        assert!(out.iter().any(|o| matches!(o, Outbound::Audio(_))));
    }

    #[test]
    fn sentence_split_keeps_text() {
        assert_eq!(
            split_units("சரி. வேற ஏதாவது?", UnitSplit::Sentences),
            vec!["சரி.", "வேற ஏதாவது?"]
        );
        assert!(split_units("   ", UnitSplit::Whole).is_empty());
    }

    #[tokio::test]
    async fn closed_channel_stops_the_stream() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let synth = EchoSynthesizer { chunk_bytes: 4 };
        let err = stream_reply(&synth, "hello", "en-IN", UnitSplit::Whole, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelClosed));
    }
}
