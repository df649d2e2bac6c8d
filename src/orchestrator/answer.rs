use futures::StreamExt;

use crate::agents::{AgentError, TextStream};

/// Final answer of one request
pub enum Answer {
    /// Complete text from an early `answer` step
    Direct(String),
    /// Live summary stream
    Streamed(AnswerStream),
}

impl Answer {
    pub fn into_stream(self) -> AnswerStream {
        match self {
            Answer::Direct(text) => AnswerStream::ready(text),
            Answer::Streamed(stream) => stream,
        }
    }
}

/// Ordered, finite text fragments of one answer
///
/// The stream ends after its source is exhausted, after the first error, or
/// once cancelled. It cannot be restarted.
pub struct AnswerStream {
    inner: Option<TextStream>,
}

impl AnswerStream {
    pub fn new(inner: TextStream) -> Self {
        Self { inner: Some(inner) }
    }

    /// Stream yielding `text` as a single fragment
    pub fn ready(text: String) -> Self {
        Self::new(futures::stream::once(async move { Ok(text) }).boxed())
    }

    pub async fn next(&mut self) -> Option<Result<String, AgentError>> {
        let item = self.inner.as_mut()?.next().await;
        match &item {
            Some(Ok(_)) => {}
            Some(Err(_)) | None => self.inner = None,
        }
        item
    }

    /// Stop producing fragments and release the underlying connection
    pub fn cancel(&mut self) {
        self.inner = None;
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// Drain the remaining fragments into one string
    pub async fn collect_text(mut self) -> Result<String, AgentError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(items: Vec<Result<&'static str, AgentError>>) -> AnswerStream {
        AnswerStream::new(
            futures::stream::iter(items.into_iter().map(|r| r.map(str::to_string))).boxed(),
        )
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let mut stream = fragments(vec![
            Ok("Xin "),
            Err(AgentError::Stream("reset".into())),
            Ok("never"),
        ]);

        assert_eq!(stream.next().await.unwrap().unwrap(), "Xin ");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.is_finished());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_stream() {
        let mut stream = fragments(vec![Ok("a"), Ok("b")]);
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        stream.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_direct_answer_as_stream() {
        let text = Answer::Direct("Chào bạn.".to_string())
            .into_stream()
            .collect_text()
            .await
            .unwrap();
        assert_eq!(text, "Chào bạn.");
    }
}
