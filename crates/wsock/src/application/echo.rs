//! Echo session: greet the client, then send every text message back.

use tracing::debug;

use crate::domain::message::Message;
use crate::error::WsError;
use crate::infrastructure::connection::Connection;

/// Drives one connection for the echo server.
pub struct EchoSession {
    conn: Box<dyn Connection>,
    greeting: String,
}

impl EchoSession {
    pub fn new(conn: Box<dyn Connection>, greeting: impl Into<String>) -> Self {
        Self {
            conn,
            greeting: greeting.into(),
        }
    }

    /// Sends the greeting (unless it is empty), then echoes text messages
    /// until the peer closes.
    ///
    /// Non-text messages are not echoed; pings have already been answered by
    /// the connection.  Returns the number of messages echoed.
    ///
    /// # Errors
    ///
    /// Any [`WsError`] from the connection.
    pub async fn run(mut self) -> Result<usize, WsError> {
        if !self.greeting.is_empty() {
            self.conn.send(self.greeting.as_bytes()).await?;
        }

        let mut echoed = 0;
        while let Some(message) = self.conn.receive().await? {
            match message {
                Message::Text(text) => {
                    self.conn.send_message(Message::Text(text)).await?;
                    echoed += 1;
                }
                other => debug!("not echoing {} message", other.kind()),
            }
        }
        Ok(echoed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::domain::message::{ConnectionState, ProtocolVersion};

    /// Connection double that replays a fixed script and records what is sent.
    struct ScriptedConnection {
        incoming: VecDeque<Message>,
        sent: Arc<Mutex<Vec<Message>>>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        fn version(&self) -> ProtocolVersion {
            ProtocolVersion::Standard
        }

        fn state(&self) -> ConnectionState {
            ConnectionState::Open
        }

        async fn send(&mut self, payload: &[u8]) -> Result<(), WsError> {
            let text = String::from_utf8(payload.to_vec()).map_err(|_| WsError::NotUtf8)?;
            self.sent.lock().unwrap().push(Message::Text(text));
            Ok(())
        }

        async fn send_message(&mut self, message: Message) -> Result<(), WsError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn receive(&mut self) -> Result<Option<Message>, WsError> {
            Ok(self.incoming.pop_front())
        }

        async fn close(&mut self) -> Result<(), WsError> {
            Ok(())
        }
    }

    fn scripted(incoming: Vec<Message>) -> (Box<dyn Connection>, Arc<Mutex<Vec<Message>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let conn = ScriptedConnection {
            incoming: incoming.into(),
            sent: Arc::clone(&sent),
        };
        (Box::new(conn), sent)
    }

    #[tokio::test]
    async fn test_greets_then_echoes_text() {
        // Arrange
        let (conn, sent) = scripted(vec![Message::Text("a".into()), Message::Text("b".into())]);

        // Act
        let echoed = EchoSession::new(conn, "hi").run().await.unwrap();

        // Assert
        assert_eq!(echoed, 2);
        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                Message::Text("hi".into()),
                Message::Text("a".into()),
                Message::Text("b".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_text_is_not_echoed() {
        let (conn, sent) = scripted(vec![Message::Binary(vec![1]), Message::Ping(vec![])]);

        let echoed = EchoSession::new(conn, "").run().await.unwrap();

        assert_eq!(echoed, 0);
        assert!(sent.lock().unwrap().is_empty());
    }
}
